//! HTTP/JSON greeting service
//!
//! `POST /` with `{"name": ...}` answers `{"message": "Hello <name>!"}`;
//! `GET /` answers a fixed greeting. Used as the remote service a portal
//! exposes when exercising the invocation client.

use crate::listen::{BoundListener, ListenAddr, ServerError};
use axum::{http::StatusCode, routing::get, Json, Router};
use bytes::Bytes;
use portal_proto::{ErrorBody, GreetingReply, GreetingRequest};
use tracing::{debug, info, warn};

/// Greeter server configuration
#[derive(Debug, Clone)]
pub struct GreeterServerConfig {
    pub listen_addr: ListenAddr,
}

impl Default for GreeterServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ListenAddr::Tcp("0.0.0.0:8000".to_string()),
        }
    }
}

/// Routes of the greeting service
pub fn greeter_router() -> Router {
    Router::new().route("/", get(hello).post(greet))
}

async fn hello() -> Json<GreetingReply> {
    Json(GreetingReply {
        message: "Hello from REST server!".to_string(),
    })
}

async fn greet(body: Bytes) -> Result<Json<GreetingReply>, (StatusCode, Json<ErrorBody>)> {
    let request = if body.is_empty() {
        GreetingRequest::default()
    } else {
        serde_json::from_slice::<GreetingRequest>(&body).map_err(|e| {
            warn!("Rejecting malformed greeting: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: format!("invalid request body: {}", e),
                }),
            )
        })?
    };

    let name = request.name.as_deref().unwrap_or("World");
    debug!("Greeting {}", name);
    Ok(Json(GreetingReply {
        message: format!("Hello {}!", name),
    }))
}

pub struct GreeterServer {
    listener: BoundListener,
}

impl GreeterServer {
    pub async fn bind(config: GreeterServerConfig) -> Result<Self, ServerError> {
        let listener = BoundListener::bind(&config.listen_addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<ListenAddr, ServerError> {
        self.listener.local_addr()
    }

    pub async fn start(config: GreeterServerConfig) -> Result<(), ServerError> {
        Self::bind(config).await?.serve().await
    }

    pub async fn serve(self) -> Result<(), ServerError> {
        let local_addr = self.listener.local_addr()?;
        info!("Greeter server listening on {}", local_addr);

        match self.listener {
            BoundListener::Tcp(listener) => axum::serve(listener, greeter_router()).await?,
            #[cfg(unix)]
            BoundListener::Unix(listener, _socket_file) => {
                axum::serve(listener, greeter_router()).await?
            }
        }

        Ok(())
    }
}
