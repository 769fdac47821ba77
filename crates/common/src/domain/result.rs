use thiserror::Error;

use super::DenialReason;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(String),

    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Invalid customer ID: {0}")]
    InvalidCustomerId(String),

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid firmware version: {0}")]
    InvalidFirmwareVersion(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(DenialReason),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Publish error: {0}")]
    PublishError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
