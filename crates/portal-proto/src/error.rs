//! Error taxonomy shared by the allocation and invocation flows

use thiserror::Error;

/// Errors surfaced by canonicalization, allocation and invocation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortalError {
    /// Endpoint descriptor is malformed or of an unknown shape
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Transport-level failure while contacting the Hub
    #[error("Portal hub unreachable: {0}")]
    HubUnreachable(String),

    /// The Hub answered but declined the request
    #[error("Portal allocation rejected: {0}")]
    AllocationRejected(String),

    /// The allocated endpoint could not be reached
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// The remote service answered with an application-level failure
    #[error("Remote service error: {0}")]
    RemoteError(String),

    /// The remote response could not be decoded
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl PortalError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn connect_failed(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a caller may reasonably retry the same call later.
    ///
    /// The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::HubUnreachable(_) | Self::ConnectFailed { .. })
    }
}
