use common::domain::{CustomerSnapshot, DomainResult, SnapshotRepository};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Read side of the real-time feed: the customer's devices and their most
/// recent history.
pub struct RealtimeSnapshotService {
    snapshot_repository: Arc<dyn SnapshotRepository>,
    history_limit: i64,
}

impl RealtimeSnapshotService {
    pub fn new(snapshot_repository: Arc<dyn SnapshotRepository>) -> Self {
        Self {
            snapshot_repository,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: i64) -> Self {
        self.history_limit = limit;
        self
    }

    /// Devices (most recently updated first) and newest-first history across
    /// them, capped at the configured limit. Both come from the same read.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, customer_id: Uuid) -> DomainResult<CustomerSnapshot> {
        self.snapshot_repository
            .customer_snapshot(customer_id, self.history_limit)
            .await
    }
}
