//! Portal client library - Public API
//!
//! Asks a Portal Hub for an endpoint, canonicalizes the URI it returns, and
//! performs one request/response exchange with the service behind it.

pub mod binding;
pub mod client;
pub mod connection;
pub mod hub;

pub use binding::{Binding, GreeterBinding, RawBinding};
pub use client::{invoke, Invoker, PortalClient};
pub use connection::{dial, Connection};
pub use hub::{DirectHub, HttpHub, PortalHub};

pub use portal_proto::{
    canonicalize, DialableAddress, PortalError, PortalHandle, PortalRequest, PortalTransport,
};
