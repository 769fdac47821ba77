use uuid::Uuid;

use crate::domain::DenialReason;

/// Checks customer access tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthTokenProvider: Send + Sync {
    /// Check signature and expiry, returning the customer the token was issued to.
    /// Each failure mode maps to its own denial reason.
    fn validate_token(&self, token: &str) -> Result<Uuid, DenialReason>;
}
