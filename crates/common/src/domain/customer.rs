use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::DomainResult;

/// Read-only view of the customer store consumed by the credential gate.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn customer_exists(&self, customer_id: Uuid) -> DomainResult<bool>;
}
