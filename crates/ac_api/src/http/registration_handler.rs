use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use common::domain::Device;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::RegisterDeviceRequest;
use crate::http::{authorize_request, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceBody {
    pub device_id: String,
    pub zone_id: Uuid,
    pub ac_brand_name: String,
    pub ac_brand_protocol: String,
    pub firmware_version: String,
}

#[derive(Debug, Deserialize)]
pub struct ZoneValidationBody {
    pub customer_id: Uuid,
    pub zone_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ZoneValidationResponse {
    pub valid: bool,
    pub message: &'static str,
}

/// `POST /customers/{customer_id}/devices`, customer or device credentials.
#[instrument(skip(state, headers, body), fields(customer_id = %customer_id))]
pub async fn register_device(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RegisterDeviceBody>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let principal = authorize_request(&state.credential_gate, &headers)
        .await?
        .into_principal()?;

    let device = state
        .registration
        .register_device(
            principal,
            RegisterDeviceRequest {
                customer_id,
                device_id: body.device_id,
                zone_id: body.zone_id,
                ac_brand_name: body.ac_brand_name,
                ac_brand_protocol: body.ac_brand_protocol,
                firmware_version: body.firmware_version,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(device)))
}

/// `POST /validate-zone`, customer or device credentials.
#[instrument(skip(state, headers, body))]
pub async fn validate_zone(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ZoneValidationBody>,
) -> Result<Json<ZoneValidationResponse>, ApiError> {
    let principal = authorize_request(&state.credential_gate, &headers)
        .await?
        .into_principal()?;

    let validation = state
        .registration
        .validate_zone(principal, body.customer_id, body.zone_id)
        .await?;

    Ok(Json(ZoneValidationResponse {
        valid: validation.valid,
        message: validation.message,
    }))
}
