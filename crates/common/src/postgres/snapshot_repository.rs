use crate::domain::{CustomerSnapshot, Device, DomainError, DomainResult, SnapshotRepository, StatusHistoryRecord};
use crate::postgres::device_repository::{DeviceRow, DEVICE_COLUMNS};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tokio_postgres::IsolationLevel;
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of SnapshotRepository.
///
/// Both reads share one repeatable-read, read-only transaction so the
/// history always belongs to the device list it is sent with.
#[derive(Clone)]
pub struct PostgresSnapshotRepository {
    client: PostgresClient,
}

impl PostgresSnapshotRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotRepository for PostgresSnapshotRepository {
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn customer_snapshot(
        &self,
        customer_id: Uuid,
        history_limit: i64,
    ) -> DomainResult<CustomerSnapshot> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let devices: Vec<Device> = tx
            .query(
                &format!(
                    "SELECT {} FROM devices WHERE customer_id = $1 ORDER BY updated_at DESC",
                    DEVICE_COLUMNS
                ),
                &[&customer_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?
            .iter()
            .map(|row| DeviceRow::from(row).into())
            .collect();

        let history = if devices.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<&str> = devices.iter().map(|d| d.device_id.as_str()).collect();
            tx.query(
                "SELECT id, device_id, status_type, payload, timestamp
                 FROM status_history
                 WHERE device_id = ANY($1)
                 ORDER BY timestamp DESC
                 LIMIT $2",
                &[&ids, &history_limit],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?
            .iter()
            .map(|row| StatusHistoryRecord {
                id: row.get("id"),
                device_id: row.get("device_id"),
                status_type: row.get("status_type"),
                payload: row.get("payload"),
                timestamp: row.get("timestamp"),
            })
            .collect()
        };

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(
            device_count = devices.len(),
            history_count = history.len(),
            "snapshot read"
        );
        Ok(CustomerSnapshot { devices, history })
    }
}
