//! Services that sit behind a portal
//!
//! - [`EchoServer`]: raw byte-stream echo, one task per connection
//! - [`GreeterServer`]: HTTP/JSON greeting service
//!
//! Both listen on either `host:port` or `unix://<path>`.

pub mod echo;
pub mod greeter;
pub mod listen;

pub use echo::{echo_session, EchoServer, EchoServerConfig};
pub use greeter::{greeter_router, GreeterServer, GreeterServerConfig};
pub use listen::{BoundListener, ListenAddr, ServerError};
