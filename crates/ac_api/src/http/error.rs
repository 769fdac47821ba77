use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::DomainError;
use serde::Serialize;
use tracing::error;

/// JSON error body: `{"detail": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// HTTP face of a `DomainError`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::InvalidCommand(_)
            | DomainError::InvalidFirmwareVersion(_)
            | DomainError::InvalidDeviceId(_)
            | DomainError::InvalidCustomerId(_)
            | DomainError::ZoneNotFound(_)
            | DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,

            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,

            DomainError::PermissionDenied(_) => StatusCode::FORBIDDEN,

            DomainError::DeviceNotFound(_) | DomainError::CustomerNotFound(_) => {
                StatusCode::NOT_FOUND
            }

            DomainError::DeviceAlreadyExists(_) => StatusCode::CONFLICT,

            DomainError::PublishError(_) => StatusCode::BAD_GATEWAY,

            DomainError::RepositoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match &self.0 {
            DomainError::Unauthorized(_) => "Could not validate credentials".to_string(),
            DomainError::DeviceNotFound(_) => "Device not found or access denied.".to_string(),
            DomainError::ZoneNotFound(_) => {
                "Zone not found or does not belong to the specified customer.".to_string()
            }
            DomainError::DeviceAlreadyExists(_) => {
                "Device with this ID already exists.".to_string()
            }
            DomainError::PublishError(_) => "Failed to publish message to device".to_string(),
            DomainError::RepositoryError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "request failed");
        }

        let body = Json(ErrorBody {
            detail: self.detail(),
        });

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
