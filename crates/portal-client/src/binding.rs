//! Application bindings for a single request/response exchange
//!
//! A [`Binding`] owns the connection for the duration of one exchange. Because
//! it takes the [`Connection`] by value, the socket is closed when the exchange
//! returns, whether it succeeded or not.

use crate::connection::Connection;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use portal_proto::{DialableAddress, ErrorBody, GreetingReply, GreetingRequest, PortalError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

/// One request/response exchange over a freshly dialled connection
#[async_trait]
pub trait Binding: Send + Sync {
    type Request: Send + 'static;
    type Response: Send + 'static;

    async fn exchange(
        &self,
        address: &DialableAddress,
        connection: Connection,
        request: Self::Request,
    ) -> Result<Self::Response, PortalError>;
}

/// Raw byte exchange: write the payload, half-close, read until the peer closes
#[derive(Debug, Clone, Default)]
pub struct RawBinding;

#[async_trait]
impl Binding for RawBinding {
    type Request = Vec<u8>;
    type Response = Vec<u8>;

    async fn exchange(
        &self,
        address: &DialableAddress,
        connection: Connection,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, PortalError> {
        let (mut reader, mut writer) = tokio::io::split(connection);

        // Read while writing so a peer that answers as it reads never stalls us
        let send = async {
            writer
                .write_all(&request)
                .await
                .map_err(|e| PortalError::ProtocolError(format!("write to {} failed: {}", address, e)))?;
            writer
                .shutdown()
                .await
                .map_err(|e| PortalError::ProtocolError(format!("shutdown of {} failed: {}", address, e)))
        };

        let receive = async {
            let mut response = Vec::new();
            reader
                .read_to_end(&mut response)
                .await
                .map_err(|e| PortalError::ProtocolError(format!("read from {} failed: {}", address, e)))?;
            Ok::<_, PortalError>(response)
        };

        let ((), response) = tokio::try_join!(send, receive)?;

        trace!(
            sent = request.len(),
            received = response.len(),
            "Raw exchange with {} complete",
            address
        );
        Ok(response)
    }
}

/// HTTP/1.1 JSON greeting: `POST <path>` with `{"name"}`, reply `{"message"}`
#[derive(Debug, Clone)]
pub struct GreeterBinding {
    path: String,
}

impl GreeterBinding {
    pub fn new() -> Self {
        Self {
            path: "/".to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    fn host_header(address: &DialableAddress) -> String {
        match address {
            DialableAddress::Tcp { .. } => address.to_string(),
            DialableAddress::Unix { .. } => "localhost".to_string(),
        }
    }

    fn remote_message(body: &[u8]) -> String {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(err) => err.error,
            Err(_) => String::from_utf8_lossy(body).trim().to_string(),
        }
    }
}

impl Default for GreeterBinding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Binding for GreeterBinding {
    type Request = GreetingRequest;
    type Response = GreetingReply;

    async fn exchange(
        &self,
        address: &DialableAddress,
        connection: Connection,
        request: GreetingRequest,
    ) -> Result<GreetingReply, PortalError> {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(connection))
            .await
            .map_err(|e| PortalError::ProtocolError(format!("HTTP handshake failed: {}", e)))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("HTTP connection closed: {}", e);
            }
        });
        // Aborting the driver drops the socket on every exit path
        let _driver = scopeguard::guard(driver, |driver| driver.abort());

        let body = serde_json::to_vec(&request)
            .map_err(|e| PortalError::ProtocolError(format!("encode request: {}", e)))?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(self.path.as_str())
            .header(HOST, Self::host_header(address))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| PortalError::ProtocolError(format!("build request: {}", e)))?;

        let response = sender
            .send_request(http_request)
            .await
            .map_err(|e| PortalError::ProtocolError(format!("request to {} failed: {}", address, e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| PortalError::ProtocolError(format!("read response body: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(PortalError::RemoteError(format!(
                "{}: {}",
                status,
                Self::remote_message(&bytes)
            )));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| PortalError::ProtocolError(format!("invalid greeting reply: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_host_header() {
        let tcp = DialableAddress::Tcp {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        assert_eq!(GreeterBinding::host_header(&tcp), "127.0.0.1:8000");

        let unix = DialableAddress::Unix {
            path: PathBuf::from("/tmp/rest.sock"),
        };
        assert_eq!(GreeterBinding::host_header(&unix), "localhost");
    }

    #[test]
    fn test_remote_message() {
        assert_eq!(
            GreeterBinding::remote_message(br#"{"error":"boom"}"#),
            "boom"
        );
        assert_eq!(GreeterBinding::remote_message(b"plain text\n"), "plain text");
    }
}
