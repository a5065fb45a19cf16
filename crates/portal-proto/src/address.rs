//! Endpoint canonicalization
//!
//! A Portal Hub reports the endpoint it allocated as a URI string. Three shapes
//! are known:
//!
//! - `unix://<path>` for a Unix domain socket
//! - `0.0.0.0:<port>`, a wildcard bind address that is only reachable locally
//!   through loopback
//! - any other `host:port`, which is already dialable
//!
//! [`canonicalize`] turns such a string into a [`DialableAddress`].

use crate::error::PortalError;
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// URI prefix marking a Unix domain socket endpoint
pub const UNIX_SCHEME_PREFIX: &str = "unix://";

/// Bind-wildcard host that is rewritten to loopback
pub const WILDCARD_HOST: &str = "0.0.0.0";

const LOOPBACK_HOST: &str = "127.0.0.1";

/// Address family of a dialable endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Tcp,
    Unix,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Tcp => write!(f, "tcp"),
            Scheme::Unix => write!(f, "unix"),
        }
    }
}

/// An address the local network stack can dial directly
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DialableAddress {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

impl DialableAddress {
    pub fn scheme(&self) -> Scheme {
        match self {
            DialableAddress::Tcp { .. } => Scheme::Tcp,
            DialableAddress::Unix { .. } => Scheme::Unix,
        }
    }

    /// Host for TCP endpoints, filesystem path for Unix endpoints
    pub fn host_or_path(&self) -> Cow<'_, str> {
        match self {
            DialableAddress::Tcp { host, .. } => Cow::Borrowed(host.as_str()),
            DialableAddress::Unix { path } => path.to_string_lossy(),
        }
    }

    /// Port for TCP endpoints; Unix endpoints have none
    pub fn port(&self) -> Option<u16> {
        match self {
            DialableAddress::Tcp { port, .. } => Some(*port),
            DialableAddress::Unix { .. } => None,
        }
    }
}

impl fmt::Display for DialableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Bare IPv6 literals need brackets to survive `ToSocketAddrs`
            DialableAddress::Tcp { host, port } if host.contains(':') && !host.starts_with('[') => {
                write!(f, "[{}]:{}", host, port)
            }
            DialableAddress::Tcp { host, port } => write!(f, "{}:{}", host, port),
            DialableAddress::Unix { path } => {
                write!(f, "{}{}", UNIX_SCHEME_PREFIX, path.display())
            }
        }
    }
}

impl std::str::FromStr for DialableAddress {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        canonicalize(s)
    }
}

/// Convert a Hub-returned endpoint URI into a dialable address.
///
/// Only the exact host `0.0.0.0` is rewritten to `127.0.0.1`. The host/port split
/// happens on the last `:`, so hosts that contain colons are kept whole.
pub fn canonicalize(uri: &str) -> Result<DialableAddress, PortalError> {
    if let Some(path) = uri.strip_prefix(UNIX_SCHEME_PREFIX) {
        if path.is_empty() {
            return Err(PortalError::invalid_address(uri, "empty unix socket path"));
        }
        return Ok(DialableAddress::Unix {
            path: PathBuf::from(path),
        });
    }

    let (host, port_str) = uri
        .rsplit_once(':')
        .ok_or_else(|| PortalError::invalid_address(uri, "expected host:port or unix://<path>"))?;

    if host.is_empty() {
        return Err(PortalError::invalid_address(uri, "empty host"));
    }

    let port = port_str
        .parse::<u16>()
        .map_err(|e| PortalError::invalid_address(uri, format!("invalid port '{}': {}", port_str, e)))?;

    let host = if host == WILDCARD_HOST {
        tracing::trace!("Rewriting wildcard endpoint {} to loopback", uri);
        LOOPBACK_HOST
    } else {
        host
    };

    Ok(DialableAddress::Tcp {
        host: host.to_string(),
        port,
    })
}
