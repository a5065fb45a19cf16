//! Listening addresses and bound listeners

use portal_proto::UNIX_SCHEME_PREFIX;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::{debug, info};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid listen address '{0}'. Expected host:port or unix:///path")]
    InvalidAddress(String),

    #[error("Failed to bind to {address}: {reason}\n\nTroubleshooting:\n  • Check if another process is using this address\n  • Try using a different address or port")]
    BindError { address: String, reason: String },
}

/// Where a server listens. Fixed at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// `host:port`, kept verbatim so bracketed IPv6 hosts resolve
    Tcp(String),
    Unix(PathBuf),
}

impl std::str::FromStr for ListenAddr {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix(UNIX_SCHEME_PREFIX) {
            if path.is_empty() {
                return Err(ServerError::InvalidAddress(s.to_string()));
            }
            return Ok(ListenAddr::Unix(PathBuf::from(path)));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(ListenAddr::Tcp(s.to_string()))
            }
            _ => Err(ServerError::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => f.write_str(addr),
            ListenAddr::Unix(path) => write!(f, "{}{}", UNIX_SCHEME_PREFIX, path.display()),
        }
    }
}

/// A listener bound to a [`ListenAddr`]
#[derive(Debug)]
pub enum BoundListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, UnixSocketFile),
}

impl BoundListener {
    /// Bind `addr`. For Unix sockets a stale file at the path is removed first.
    pub async fn bind(addr: &ListenAddr) -> Result<Self, ServerError> {
        let bind_error = |e: io::Error| ServerError::BindError {
            address: addr.to_string(),
            reason: e.to_string(),
        };

        match addr {
            ListenAddr::Tcp(host_port) => {
                let listener = TcpListener::bind(host_port.as_str())
                    .await
                    .map_err(bind_error)?;
                Ok(BoundListener::Tcp(listener))
            }
            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                remove_stale_socket(path).map_err(bind_error)?;
                let listener = UnixListener::bind(path).map_err(bind_error)?;
                Ok(BoundListener::Unix(
                    listener,
                    UnixSocketFile(path.to_path_buf()),
                ))
            }
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => Err(bind_error(io::Error::new(
                io::ErrorKind::Unsupported,
                "Unix sockets not supported on this platform",
            ))),
        }
    }

    /// Address actually bound; resolves port 0 for TCP
    pub fn local_addr(&self) -> Result<ListenAddr, ServerError> {
        match self {
            BoundListener::Tcp(listener) => Ok(ListenAddr::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            BoundListener::Unix(_, file) => Ok(ListenAddr::Unix(file.0.clone())),
        }
    }
}

/// Removes the socket file when the listener goes away
#[derive(Debug)]
pub struct UnixSocketFile(PathBuf);

impl Drop for UnixSocketFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Last writer wins: whatever sits at `path` is unlinked, no locking
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Removed stale socket file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No stale socket at {}", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listen_addr() {
        assert_eq!(
            "0.0.0.0:12345".parse::<ListenAddr>().unwrap(),
            ListenAddr::Tcp("0.0.0.0:12345".to_string())
        );
        assert_eq!(
            "unix:///tmp/echo.sock".parse::<ListenAddr>().unwrap(),
            ListenAddr::Unix(PathBuf::from("/tmp/echo.sock"))
        );
        assert_eq!(
            "[::1]:8000".parse::<ListenAddr>().unwrap(),
            ListenAddr::Tcp("[::1]:8000".to_string())
        );
    }

    #[test]
    fn test_parse_listen_addr_invalid() {
        assert!("localhost".parse::<ListenAddr>().is_err());
        assert!("unix://".parse::<ListenAddr>().is_err());
        assert!(":80".parse::<ListenAddr>().is_err());
        assert!("host:port".parse::<ListenAddr>().is_err());
    }

    #[tokio::test]
    async fn test_bind_tcp_ephemeral() {
        let addr: ListenAddr = "127.0.0.1:0".parse().unwrap();
        let listener = BoundListener::bind(&addr).await.unwrap();
        match listener.local_addr().unwrap() {
            ListenAddr::Tcp(bound) => assert!(!bound.ends_with(":0")),
            other => panic!("unexpected address {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_unix_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"left over").unwrap();

        let addr = ListenAddr::Unix(path.clone());
        let listener = BoundListener::bind(&addr).await.unwrap();
        assert!(path.exists());

        drop(listener);
        assert!(!path.exists());
    }
}
