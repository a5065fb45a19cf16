//! Portal Hub access
//!
//! The Hub is an external broker. This module only knows its client contract:
//! send a [`PortalRequest`], get back a [`PortalHandle`].

use async_trait::async_trait;
use portal_proto::{
    ErrorBody, HubPortalRequest, HubPortalResponse, PortalError, PortalHandle, PortalRequest,
    PortalTransport, PORTAL_PATH,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can allocate a portal for a request
#[async_trait]
pub trait PortalHub: Send + Sync {
    /// Allocate an endpoint for `request`.
    ///
    /// Performs a single call and never retries.
    async fn allocate(&self, request: &PortalRequest) -> Result<PortalHandle, PortalError>;
}

#[async_trait]
impl<H: PortalHub + ?Sized> PortalHub for Arc<H> {
    async fn allocate(&self, request: &PortalRequest) -> Result<PortalHandle, PortalError> {
        (**self).allocate(request).await
    }
}

/// Portal Hub reached over its HTTP/JSON API
#[derive(Debug, Clone)]
pub struct HttpHub {
    base_url: String,
    client: reqwest::Client,
    timeout: Option<Duration>,
    default_user_id: Option<String>,
}

impl HttpHub {
    /// Create a hub client for `base_url` (e.g. `http://127.0.0.1:3000`).
    ///
    /// A missing scheme defaults to `http://`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.contains("://") {
            base_url
        } else {
            format!("http://{}", base_url)
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Self::build_client(),
            timeout: None,
            default_user_id: None,
        }
    }

    /// Each allocation opens and closes its own connection to the Hub
    fn build_client() -> reqwest::Client {
        reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to configure hub HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            })
    }

    /// Bound each Hub call. Without one, a call waits as long as the Hub does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// User id sent on requests that do not carry one
    pub fn with_default_user_id(mut self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        self.default_user_id = (!user_id.is_empty()).then_some(user_id);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn portal_url(&self) -> String {
        format!("{}{}", self.base_url, PORTAL_PATH)
    }

    fn wire_request(&self, request: &PortalRequest) -> HubPortalRequest {
        let mut body = HubPortalRequest::from(request);
        if body.user_id.is_none() {
            body.user_id = self.default_user_id.clone();
        }
        body
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, PortalError> {
        let builder = match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PortalError::HubUnreachable(format!("timed out contacting {}", self.base_url))
            } else {
                PortalError::HubUnreachable(e.to_string())
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = Self::error_message(response).await;
        warn!(status = %status, "Portal hub rejected request: {}", message);
        Err(PortalError::AllocationRejected(message))
    }

    /// The Hub's own error text, unchanged
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.error,
            Err(_) if !text.trim().is_empty() => text.trim().to_string(),
            Err(_) => status.to_string(),
        }
    }

    /// Ask the Hub to tear down the portal named by `request`
    pub async fn release(&self, request: &PortalRequest) -> Result<(), PortalError> {
        let body = self.wire_request(request);
        debug!("Releasing portal {} via {}", request.remote_id(), self.base_url);

        self.send(self.client.delete(self.portal_url()).json(&body))
            .await?;

        info!("Released portal {}", request.remote_id());
        Ok(())
    }
}

#[async_trait]
impl PortalHub for HttpHub {
    async fn allocate(&self, request: &PortalRequest) -> Result<PortalHandle, PortalError> {
        let body = self.wire_request(request);
        debug!(
            device_id = %request.device_id,
            service_name = %request.service_name,
            transport = %request.transport,
            "Requesting portal from {}",
            self.base_url
        );

        let response = self
            .send(self.client.post(self.portal_url()).json(&body))
            .await?;

        let text = response
            .text()
            .await
            .map_err(|e| PortalError::HubUnreachable(e.to_string()))?;

        let body: HubPortalResponse = serde_json::from_str(&text)
            .map_err(|e| PortalError::ProtocolError(format!("invalid hub response: {}", e)))?;

        if body.uri.is_empty() {
            return Err(PortalError::ProtocolError(
                "hub returned an empty uri".to_string(),
            ));
        }

        info!("Portal {} allocated at {}", request.remote_id(), body.uri);
        Ok(PortalHandle::new(body.uri))
    }
}

/// Hub stand-in that names endpoints locally, without a broker.
///
/// The URIs follow the Hub's naming: an explicit Unix path, a per-service
/// socket under `/tmp`, or a wildcard TCP bind address.
#[derive(Debug, Clone, Default)]
pub struct DirectHub;

impl DirectHub {
    pub fn new() -> Self {
        Self
    }

    pub fn endpoint_uri(request: &PortalRequest) -> String {
        match &request.transport {
            PortalTransport::Unix { path: Some(path) } if !path.is_empty() => {
                format!("unix://{}", path)
            }
            PortalTransport::Unix { .. } => format!(
                "unix:///tmp/lrc_{}_{}.sock",
                request.device_id, request.service_name
            ),
            PortalTransport::Tcp { port } => format!("0.0.0.0:{}", port.unwrap_or(0)),
        }
    }
}

#[async_trait]
impl PortalHub for DirectHub {
    async fn allocate(&self, request: &PortalRequest) -> Result<PortalHandle, PortalError> {
        let uri = Self::endpoint_uri(request);
        debug!("Direct portal {} -> {}", request.remote_id(), uri);
        Ok(PortalHandle::new(uri))
    }
}
