//! Allocation request and handle types

use crate::address::{canonicalize, DialableAddress};
use crate::error::PortalError;
use std::fmt;

/// Kind of endpoint the caller wants the Hub to allocate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortalTransport {
    /// TCP endpoint, optionally on a specific port
    Tcp { port: Option<u16> },
    /// Unix domain socket, optionally at a specific path
    Unix { path: Option<String> },
}

impl Default for PortalTransport {
    fn default() -> Self {
        PortalTransport::Tcp { port: None }
    }
}

impl fmt::Display for PortalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalTransport::Tcp { port: Some(port) } => write!(f, "tcp:{}", port),
            PortalTransport::Tcp { port: None } => write!(f, "tcp"),
            PortalTransport::Unix { path: Some(path) } => write!(f, "unix:{}", path),
            PortalTransport::Unix { path: None } => write!(f, "unix"),
        }
    }
}

/// Request asking a Hub for a reachable endpoint to a remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    /// Remote peer (robot/device) hosting the service
    pub device_id: String,
    /// Logical service name on that peer
    pub service_name: String,
    pub transport: PortalTransport,
    pub user_id: Option<String>,
}

impl PortalRequest {
    pub fn builder() -> PortalRequestBuilder {
        PortalRequestBuilder::default()
    }

    /// `<device>-<service>`, the name a Hub uses for the portal
    pub fn remote_id(&self) -> String {
        format!("{}-{}", self.device_id, self.service_name)
    }
}

/// Builder for PortalRequest
#[derive(Default)]
pub struct PortalRequestBuilder {
    device_id: String,
    service_name: String,
    transport: PortalTransport,
    user_id: Option<String>,
}

impl PortalRequestBuilder {
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn tcp(mut self, port: Option<u16>) -> Self {
        self.transport = PortalTransport::Tcp { port };
        self
    }

    pub fn unix(mut self, path: Option<String>) -> Self {
        self.transport = PortalTransport::Unix { path };
        self
    }

    pub fn transport(mut self, transport: PortalTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn build(self) -> Result<PortalRequest, String> {
        if self.device_id.trim().is_empty() {
            return Err("device_id is required".to_string());
        }
        if self.service_name.trim().is_empty() {
            return Err("service_name is required".to_string());
        }
        Ok(PortalRequest {
            device_id: self.device_id,
            service_name: self.service_name,
            transport: self.transport,
            user_id: self.user_id.filter(|u| !u.is_empty()),
        })
    }
}

/// Endpoint returned by a Hub. Opaque until canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortalHandle {
    pub uri: String,
}

impl PortalHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Canonicalize the handle's URI into something that can be dialled
    pub fn dialable(&self) -> Result<DialableAddress, PortalError> {
        canonicalize(&self.uri)
    }
}

impl fmt::Display for PortalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Scheme;

    #[test]
    fn test_request_builder() {
        let request = PortalRequest::builder()
            .device_id("robot_1")
            .service_name("hello_service")
            .unix(Some("/tmp/hello.sock".to_string()))
            .user_id("alice")
            .build()
            .unwrap();

        assert_eq!(request.device_id, "robot_1");
        assert_eq!(
            request.transport,
            PortalTransport::Unix {
                path: Some("/tmp/hello.sock".to_string())
            }
        );
        assert_eq!(request.user_id.as_deref(), Some("alice"));
        assert_eq!(request.remote_id(), "robot_1-hello_service");
    }

    #[test]
    fn test_request_builder_defaults_to_tcp() {
        let request = PortalRequest::builder()
            .device_id("robot_1")
            .service_name("hello_service")
            .build()
            .unwrap();

        assert_eq!(request.transport, PortalTransport::Tcp { port: None });
        assert!(request.user_id.is_none());
    }

    #[test]
    fn test_request_builder_missing_device() {
        let result = PortalRequest::builder().service_name("svc").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_request_builder_missing_service() {
        let result = PortalRequest::builder().device_id("robot_1").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_user_id_dropped() {
        let request = PortalRequest::builder()
            .device_id("robot_1")
            .service_name("svc")
            .user_id("")
            .build()
            .unwrap();
        assert!(request.user_id.is_none());
    }

    #[test]
    fn test_handle_dialable() {
        let handle = PortalHandle::new("0.0.0.0:50051");
        let addr = handle.dialable().unwrap();
        assert_eq!(addr.scheme(), Scheme::Tcp);
        assert_eq!(addr.to_string(), "127.0.0.1:50051");
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(PortalTransport::Tcp { port: Some(80) }.to_string(), "tcp:80");
        assert_eq!(PortalTransport::Unix { path: None }.to_string(), "unix");
    }
}
