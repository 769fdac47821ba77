use thiserror::Error;
use uuid::Uuid;

use super::{DomainError, DomainResult};

/// Why a set of credentials was refused.
///
/// Reasons are kept distinct for logging; callers only ever see a denial.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    #[error("no credentials supplied")]
    MissingCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("token malformed")]
    TokenMalformed,

    #[error("token signature invalid")]
    BadSignature,

    #[error("customer referenced by token does not exist")]
    UnknownCustomer,

    #[error("device secret rejected")]
    InvalidDeviceSecret,

    #[error("token customer does not match requested customer")]
    CustomerMismatch,
}

/// Authenticated customer resolved from a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerPrincipal {
    pub customer_id: Uuid,
}

/// An authenticated caller.
///
/// `Device` carries no customer identity; it only proves the caller holds the
/// shared device secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Customer(CustomerPrincipal),
    Device,
}

/// Outcome of running request credentials through the credential gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Customer(CustomerPrincipal),
    Device,
    Unauthorized(DenialReason),
}

impl AccessDecision {
    /// Accept either kind of principal.
    pub fn into_principal(self) -> DomainResult<Principal> {
        match self {
            AccessDecision::Customer(customer) => Ok(Principal::Customer(customer)),
            AccessDecision::Device => Ok(Principal::Device),
            AccessDecision::Unauthorized(reason) => Err(DomainError::Unauthorized(reason)),
        }
    }

    /// Accept only a customer principal. Devices are authenticated but not
    /// allowed to act on behalf of a customer.
    pub fn into_customer(self) -> DomainResult<CustomerPrincipal> {
        match self {
            AccessDecision::Customer(customer) => Ok(customer),
            AccessDecision::Device => Err(DomainError::PermissionDenied(
                "customer credentials required".to_string(),
            )),
            AccessDecision::Unauthorized(reason) => Err(DomainError::Unauthorized(reason)),
        }
    }
}
