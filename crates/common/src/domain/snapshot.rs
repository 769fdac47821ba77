use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Device, DomainResult, StatusHistoryRecord};

/// One consistent view of a customer's devices and their latest history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerSnapshot {
    /// Most recently updated first
    pub devices: Vec<Device>,
    /// Newest first across all of `devices`
    pub history: Vec<StatusHistoryRecord>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Read the devices and at most `history_limit` history rows in a single
    /// read-only transaction. History is not queried when there are no devices.
    async fn customer_snapshot(
        &self,
        customer_id: Uuid,
        history_limit: i64,
    ) -> DomainResult<CustomerSnapshot>;
}
