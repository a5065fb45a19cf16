//! JSON wire types
//!
//! The HTTP Portal Hub speaks the field names of the original robot tooling
//! (`robot_id`, `portal_type`, `inet_port`, `unix_file`); [`HubPortalRequest`]
//! translates a [`PortalRequest`] into that shape.

use crate::request::{PortalRequest, PortalTransport};
use serde::{Deserialize, Serialize};

/// Body of `POST /portal` and `DELETE /portal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubPortalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub robot_id: String,
    pub service_name: String,
    /// "inet" or "unix"
    #[serde(default)]
    pub portal_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inet_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_file: Option<String>,
}

impl From<&PortalRequest> for HubPortalRequest {
    fn from(req: &PortalRequest) -> Self {
        let (portal_type, inet_port, unix_file) = match &req.transport {
            PortalTransport::Tcp { port } => ("inet", port.map(|p| p.to_string()), None),
            PortalTransport::Unix { path } => ("unix", None, path.clone()),
        };

        Self {
            user_id: req.user_id.clone(),
            robot_id: req.device_id.clone(),
            service_name: req.service_name.clone(),
            portal_type: portal_type.to_string(),
            inet_port,
            unix_file,
        }
    }
}

/// Successful allocation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubPortalResponse {
    pub uri: String,
}

/// Error body returned by the Hub and by the greeter service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Greeting request, `POST /` on the greeter service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl GreetingRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingReply {
    pub message: String,
}
