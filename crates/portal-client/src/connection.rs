//! One-shot connections to a dialable address

use portal_proto::{DialableAddress, PortalError, Scheme};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

/// A dialled byte stream, TCP or Unix domain.
///
/// Dropping it closes the underlying socket.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    pub fn scheme(&self) -> Scheme {
        match self {
            Connection::Tcp(_) => Scheme::Tcp,
            #[cfg(unix)]
            Connection::Unix(_) => Scheme::Unix,
        }
    }
}

/// Open a fresh connection to `address`.
///
/// No pooling: every call creates its own socket. `timeout` bounds only the
/// connect step.
pub async fn dial(
    address: &DialableAddress,
    timeout: Option<Duration>,
) -> Result<Connection, PortalError> {
    let connect = async {
        match address {
            DialableAddress::Tcp { .. } => {
                let stream = TcpStream::connect(address.to_string()).await?;
                Ok::<_, io::Error>(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            DialableAddress::Unix { path } => {
                let stream = UnixStream::connect(path).await?;
                Ok::<_, io::Error>(Connection::Unix(stream))
            }
            #[cfg(not(unix))]
            DialableAddress::Unix { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Unix sockets not supported on this platform",
            )),
        }
    };

    let result: io::Result<Connection> = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", timeout),
            )),
        },
        None => connect.await,
    };

    let connection = result.map_err(|e| PortalError::connect_failed(address.to_string(), e))?;
    debug!("Connected to {} ({})", address, connection.scheme());
    Ok(connection)
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
