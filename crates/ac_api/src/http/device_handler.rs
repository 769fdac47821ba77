use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{SendCommandRequest, StartOtaRequest};
use crate::http::{authorize_request, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CommandBody {
    pub command: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
    pub topic: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct OtaBody {
    pub firmware_url: String,
    pub firmware_version: String,
}

#[derive(Debug, Serialize)]
pub struct OtaResponse {
    pub status: &'static str,
    pub topic: String,
    pub firmware_url: String,
    pub firmware_version: String,
}

/// `POST /devices/{device_id}/command`, customer credentials only.
#[instrument(skip(state, headers, body), fields(device_id = %device_id))]
pub async fn send_command(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CommandBody>,
) -> Result<Json<CommandResponse>, ApiError> {
    let customer = authorize_request(&state.credential_gate, &headers)
        .await?
        .into_customer()?;

    let receipt = state
        .device_control
        .send_command(SendCommandRequest {
            customer_id: customer.customer_id,
            device_id,
            command: body.command,
            value: body.value,
        })
        .await?;

    Ok(Json(CommandResponse {
        status: "Command sent successfully",
        topic: receipt.topic,
        value: receipt.value,
    }))
}

/// `POST /devices/{device_id}/ota`, customer credentials only.
#[instrument(skip(state, headers, body), fields(device_id = %device_id))]
pub async fn start_ota(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<OtaBody>,
) -> Result<Json<OtaResponse>, ApiError> {
    let customer = authorize_request(&state.credential_gate, &headers)
        .await?
        .into_customer()?;

    let receipt = state
        .device_control
        .start_ota(StartOtaRequest {
            customer_id: customer.customer_id,
            device_id,
            firmware_url: body.firmware_url,
            firmware_version: body.firmware_version,
        })
        .await?;

    Ok(Json(OtaResponse {
        status: "OTA update initiated",
        topic: receipt.topic,
        firmware_url: receipt.firmware_url,
        firmware_version: receipt.firmware_version,
    }))
}
