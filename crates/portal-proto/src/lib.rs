//! Portal Protocol Definitions
//!
//! This crate defines the types shared by every part of the portal toolchain:
//! the allocation request sent to a Portal Hub, the handle it returns, the
//! canonicalization rules that turn that handle into a dialable address, and
//! the error taxonomy used across the workspace.

pub mod address;
pub mod error;
pub mod request;
pub mod wire;

pub use address::{canonicalize, DialableAddress, Scheme, UNIX_SCHEME_PREFIX, WILDCARD_HOST};
pub use error::PortalError;
pub use request::{PortalHandle, PortalRequest, PortalRequestBuilder, PortalTransport};
pub use wire::{ErrorBody, GreetingReply, GreetingRequest, HubPortalRequest, HubPortalResponse};

/// Path of the allocation resource on an HTTP Portal Hub
pub const PORTAL_PATH: &str = "/portal";
