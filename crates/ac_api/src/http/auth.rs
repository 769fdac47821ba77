use axum::http::{header, HeaderMap};
use common::auth::{CredentialGate, Credentials, DEVICE_SECRET_HEADER};
use common::domain::AccessDecision;

use crate::http::ApiError;

/// Run the request's `Authorization` and device secret headers through the
/// credential gate. Headers that are not valid visible ASCII count as absent.
pub async fn authorize_request(
    gate: &CredentialGate,
    headers: &HeaderMap,
) -> Result<AccessDecision, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let device_secret = headers
        .get(DEVICE_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    let credentials = Credentials::from_headers(authorization, device_secret);
    Ok(gate.authorize(&credentials).await?)
}
