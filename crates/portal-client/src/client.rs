//! Allocation → canonicalization → invocation flow

use crate::binding::Binding;
use crate::connection::dial;
use crate::hub::PortalHub;
use portal_proto::{DialableAddress, PortalError, PortalHandle, PortalRequest};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Dials one connection per call and runs a single exchange over it
#[derive(Debug, Clone, Default)]
pub struct Invoker {
    connect_timeout: Option<Duration>,
}

impl Invoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the connect step. The exchange itself is not bounded; wrap the
    /// call in `tokio::time::timeout` to bound it, which also closes the socket.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub async fn invoke<B: Binding>(
        &self,
        binding: &B,
        address: &DialableAddress,
        request: B::Request,
    ) -> Result<B::Response, PortalError> {
        let connection = dial(address, self.connect_timeout).await?;
        let result = binding.exchange(address, connection, request).await;
        if let Err(ref e) = result {
            debug!("Exchange with {} failed: {}", address, e);
        }
        result
    }
}

/// Invoke with default settings: no connect timeout
pub async fn invoke<B: Binding>(
    binding: &B,
    address: &DialableAddress,
    request: B::Request,
) -> Result<B::Response, PortalError> {
    Invoker::default().invoke(binding, address, request).await
}

/// High-level client tying a hub to an invoker
pub struct PortalClient<H> {
    hub: H,
    invoker: Invoker,
}

impl<H: PortalHub> PortalClient<H> {
    pub fn new(hub: H) -> Self {
        Self {
            hub,
            invoker: Invoker::default(),
        }
    }

    pub fn with_invoker(mut self, invoker: Invoker) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub async fn allocate(&self, request: &PortalRequest) -> Result<PortalHandle, PortalError> {
        self.hub.allocate(request).await
    }

    /// Allocate a portal and canonicalize its URI
    pub async fn open(&self, request: &PortalRequest) -> Result<DialableAddress, PortalError> {
        let handle = self.allocate(request).await?;
        let address = handle.dialable()?;
        debug!("Portal {} resolved to {}", handle, address);
        Ok(address)
    }

    /// Allocate, canonicalize, then run one exchange with the remote service.
    ///
    /// Nothing is dialled unless allocation and canonicalization both succeed.
    pub async fn call<B: Binding>(
        &self,
        binding: &B,
        request: &PortalRequest,
        payload: B::Request,
    ) -> Result<B::Response, PortalError> {
        let address = match self.open(request).await {
            Ok(address) => address,
            Err(e) => {
                warn!("Portal {} unavailable: {}", request.remote_id(), e);
                return Err(e);
            }
        };

        let response = self.invoker.invoke(binding, &address, payload).await?;
        info!("Call through portal {} succeeded", request.remote_id());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::RawBinding;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingHub {
        calls: AtomicUsize,
        error: PortalError,
    }

    #[async_trait]
    impl PortalHub for FailingHub {
        async fn allocate(&self, _request: &PortalRequest) -> Result<PortalHandle, PortalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    struct CountingBinding {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Binding for CountingBinding {
        type Request = ();
        type Response = ();

        async fn exchange(
            &self,
            _address: &DialableAddress,
            _connection: crate::Connection,
            _request: (),
        ) -> Result<(), PortalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn request() -> PortalRequest {
        PortalRequest::builder()
            .device_id("robot_1")
            .service_name("hello_service")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_allocation_skips_invoke() {
        for error in [
            PortalError::HubUnreachable("connection refused".to_string()),
            PortalError::AllocationRejected("unknown robot".to_string()),
        ] {
            let client = PortalClient::new(FailingHub {
                calls: AtomicUsize::new(0),
                error: error.clone(),
            });
            let binding = CountingBinding {
                calls: AtomicUsize::new(0),
            };

            let result = client.call(&binding, &request(), ()).await;
            assert_eq!(result.unwrap_err(), error);
            assert_eq!(client.hub().calls.load(Ordering::SeqCst), 1);
            assert_eq!(binding.calls.load(Ordering::SeqCst), 0);
        }
    }

    struct StaticHub(&'static str);

    #[async_trait]
    impl PortalHub for StaticHub {
        async fn allocate(&self, _request: &PortalRequest) -> Result<PortalHandle, PortalError> {
            Ok(PortalHandle::new(self.0))
        }
    }

    #[tokio::test]
    async fn test_invalid_uri_skips_invoke() {
        let client = PortalClient::new(StaticHub("not-an-address"));
        let result = client.call(&RawBinding, &request(), b"hi".to_vec()).await;
        assert!(matches!(result, Err(PortalError::InvalidAddress { .. })));
    }
}
