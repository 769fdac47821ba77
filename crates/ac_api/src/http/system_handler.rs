use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::http::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
}

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "AC Control Management API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

/// `200` when the database answers, `503` otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    match state.health.check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthStatus {
                status: "healthy",
                database: "connected",
            }),
        ),
        Err(e) => {
            warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unhealthy",
                    database: "unreachable",
                }),
            )
        }
    }
}
