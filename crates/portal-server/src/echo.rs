//! Echo server implementation
//!
//! Each accepted connection gets its own task that writes back every chunk it
//! reads, byte for byte, until the peer closes or an I/O error occurs. Sessions
//! share nothing.

use crate::listen::{BoundListener, ListenAddr, ServerError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

const BUFFER_SIZE: usize = 4096;

/// Echo server configuration
#[derive(Debug, Clone)]
pub struct EchoServerConfig {
    pub listen_addr: ListenAddr,
}

impl Default for EchoServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ListenAddr::Tcp("0.0.0.0:12345".to_string()),
        }
    }
}

/// Connectivity smoke-test server
pub struct EchoServer {
    listener: BoundListener,
}

impl EchoServer {
    /// Bind the configured address without accepting yet
    pub async fn bind(config: EchoServerConfig) -> Result<Self, ServerError> {
        let listener = BoundListener::bind(&config.listen_addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<ListenAddr, ServerError> {
        self.listener.local_addr()
    }

    /// Bind and serve forever
    pub async fn start(config: EchoServerConfig) -> Result<(), ServerError> {
        Self::bind(config).await?.serve().await
    }

    /// Accept connections indefinitely, one task per connection.
    ///
    /// The loop itself only accepts and spawns; accept errors are logged and
    /// accepting continues.
    pub async fn serve(self) -> Result<(), ServerError> {
        let local_addr = self.listener.local_addr()?;
        info!("Echo server listening on {}", local_addr);

        match self.listener {
            BoundListener::Tcp(listener) => loop {
                match listener.accept().await {
                    Ok((socket, peer_addr)) => {
                        debug!("Accepted TCP connection from {}", peer_addr);
                        tokio::spawn(echo_session(socket, peer_addr.to_string()));
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            },
            #[cfg(unix)]
            BoundListener::Unix(listener, _socket_file) => {
                let mut accepted: u64 = 0;
                loop {
                    match listener.accept().await {
                        Ok((socket, _)) => {
                            accepted += 1;
                            let peer = format!("{}#{}", local_addr, accepted);
                            debug!("Accepted Unix connection {}", peer);
                            tokio::spawn(echo_session(socket, peer));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Run one echo session to completion and return the number of bytes echoed.
///
/// A zero-length read or any read/write error ends the session; errors are the
/// normal way a session ends and are not escalated.
pub async fn echo_session<S>(mut stream: S, peer: String) -> u64
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut echoed = 0u64;

    loop {
        match stream.read(&mut buffer).await {
            Ok(0) => {
                debug!("{} closed its write side", peer);
                break;
            }
            Ok(n) => {
                if let Err(e) = stream.write_all(&buffer[..n]).await {
                    debug!("{} write error: {}", peer, e);
                    break;
                }
                echoed += n as u64;
            }
            Err(e) => {
                debug!("{} read error: {}", peer, e);
                break;
            }
        }
    }

    info!(bytes = echoed, "Connection closed: {}", peer);
    echoed
}
