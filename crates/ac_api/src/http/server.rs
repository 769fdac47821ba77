use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::http::{
    device_feed, health, register_device, send_command, service_info, start_ota, validate_zone,
    AppState,
};

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// CORS is wide open; clients are browser dashboards served from anywhere.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/devices/:device_id/command", post(send_command))
        .route("/devices/:device_id/ota", post(start_ota))
        .route("/customers/:customer_id/devices", post(register_device))
        .route("/validate-zone", post(validate_zone))
        .route("/ws/devices/:customer_id", get(device_feed))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(state)
}

pub async fn run_http_server(
    config: HttpServerConfig,
    state: AppState,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    debug!(address = %addr, "Starting HTTP server");

    let serve = axum::serve(listener, build_router(state)).with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        debug!("HTTP server shutdown signal received");
    });

    match serve.await {
        Ok(()) => {
            debug!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "HTTP server error");
            Err(e.into())
        }
    }
}
