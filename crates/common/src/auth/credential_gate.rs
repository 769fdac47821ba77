use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::auth::AuthTokenProvider;
use crate::domain::{
    AccessDecision, CustomerPrincipal, CustomerRepository, DenialReason, DomainError, DomainResult,
};

/// Header a device uses to present the shared device secret.
pub const DEVICE_SECRET_HEADER: &str = "x-device-secret";

/// Credentials presented with a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub bearer_token: Option<&'a str>,
    pub device_secret: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    /// Build credentials from raw `Authorization` and device secret header values.
    pub fn from_headers(authorization: Option<&'a str>, device_secret: Option<&'a str>) -> Self {
        Self {
            bearer_token: authorization.map(strip_bearer),
            device_secret,
        }
    }
}

fn strip_bearer(header: &str) -> &str {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim()
}

/// Resolves request credentials to a customer, a device, or a denial.
///
/// A bearer token always takes precedence over a device secret. The customer
/// named by a valid token must still exist in the store.
pub struct CredentialGate {
    token_provider: Arc<dyn AuthTokenProvider>,
    customer_repository: Arc<dyn CustomerRepository>,
    device_secret: String,
}

impl CredentialGate {
    pub fn new(
        token_provider: Arc<dyn AuthTokenProvider>,
        customer_repository: Arc<dyn CustomerRepository>,
        device_secret: String,
    ) -> Self {
        Self {
            token_provider,
            customer_repository,
            device_secret,
        }
    }

    #[instrument(skip_all, fields(
        has_token = credentials.bearer_token.is_some(),
        has_device_secret = credentials.device_secret.is_some(),
    ))]
    pub async fn authorize(&self, credentials: &Credentials<'_>) -> DomainResult<AccessDecision> {
        let decision = match (credentials.bearer_token, credentials.device_secret) {
            (Some(token), _) => match self.resolve_customer(token).await? {
                Ok(customer) => AccessDecision::Customer(customer),
                Err(reason) => AccessDecision::Unauthorized(reason),
            },
            (None, Some(secret)) => {
                if secrets_match(secret, &self.device_secret) {
                    AccessDecision::Device
                } else {
                    AccessDecision::Unauthorized(DenialReason::InvalidDeviceSecret)
                }
            }
            (None, None) => AccessDecision::Unauthorized(DenialReason::MissingCredentials),
        };

        match decision {
            AccessDecision::Unauthorized(reason) => {
                warn!(reason = %reason, "credentials rejected")
            }
            AccessDecision::Customer(customer) => {
                debug!(customer_id = %customer.customer_id, "customer authenticated")
            }
            AccessDecision::Device => debug!("device authenticated"),
        }

        Ok(decision)
    }

    /// Verify a token for a customer-scoped connection: the token's customer
    /// must exist and equal the customer named in the request path.
    #[instrument(skip(self, token), fields(customer_id = %path_customer_id))]
    pub async fn verify_customer_for_path(
        &self,
        token: &str,
        path_customer_id: Uuid,
    ) -> DomainResult<CustomerPrincipal> {
        let customer = match self.resolve_customer(strip_bearer(token)).await? {
            Ok(customer) => customer,
            Err(reason) => {
                warn!(reason = %reason, "connection token rejected");
                return Err(DomainError::Unauthorized(reason));
            }
        };

        if customer.customer_id != path_customer_id {
            warn!(
                token_customer_id = %customer.customer_id,
                "token customer does not match path customer"
            );
            return Err(DomainError::Unauthorized(DenialReason::CustomerMismatch));
        }

        Ok(customer)
    }

    /// Outer error is a store failure; inner error is a denial.
    async fn resolve_customer(
        &self,
        token: &str,
    ) -> DomainResult<Result<CustomerPrincipal, DenialReason>> {
        if token.is_empty() {
            return Ok(Err(DenialReason::TokenMalformed));
        }

        let customer_id = match self.token_provider.validate_token(token) {
            Ok(customer_id) => customer_id,
            Err(reason) => return Ok(Err(reason)),
        };

        if !self.customer_repository.customer_exists(customer_id).await? {
            return Ok(Err(DenialReason::UnknownCustomer));
        }

        Ok(Ok(CustomerPrincipal { customer_id }))
    }
}

fn secrets_match(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
