use crate::domain::{DomainError, DomainResult, RecordOutcome, TelemetryStore, TelemetryWrite};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Transaction;
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of TelemetryStore.
///
/// Lookup, device update and history append share one transaction; any error
/// drops the transaction, which rolls it back.
#[derive(Clone)]
pub struct PostgresTelemetryStore {
    client: PostgresClient,
}

impl PostgresTelemetryStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TelemetryStore for PostgresTelemetryStore {
    #[instrument(skip(self, write), fields(device_id = %write.device_id, kind = %write.kind))]
    async fn record_telemetry(&self, write: TelemetryWrite) -> DomainResult<RecordOutcome> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if !find_device(&tx, write.device_id.as_str()).await? {
            tx.rollback()
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            return Ok(RecordOutcome::UnknownDevice);
        }

        upsert_device_fields(
            &tx,
            write.device_id.as_str(),
            write.received_at,
            write.firmware_version.as_deref(),
        )
        .await?;

        append_history(
            &tx,
            write.device_id.as_str(),
            write.kind.as_str(),
            &write.payload,
            write.received_at,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("telemetry recorded");
        Ok(RecordOutcome::Recorded)
    }
}

/// Locks the device row for the rest of the transaction.
async fn find_device(tx: &Transaction<'_>, device_id: &str) -> DomainResult<bool> {
    let row = tx
        .query_opt(
            "SELECT device_id FROM devices WHERE device_id = $1 FOR UPDATE",
            &[&device_id],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

    Ok(row.is_some())
}

async fn upsert_device_fields(
    tx: &Transaction<'_>,
    device_id: &str,
    last_seen: DateTime<Utc>,
    firmware_version: Option<&str>,
) -> DomainResult<()> {
    tx.execute(
        "UPDATE devices
         SET last_seen = $2,
             firmware_version = COALESCE($3, firmware_version),
             updated_at = NOW()
         WHERE device_id = $1",
        &[&device_id, &last_seen, &firmware_version],
    )
    .await
    .map_err(|e| DomainError::RepositoryError(e.into()))?;

    Ok(())
}

async fn append_history(
    tx: &Transaction<'_>,
    device_id: &str,
    status_type: &str,
    payload: &serde_json::Value,
    timestamp: DateTime<Utc>,
) -> DomainResult<()> {
    tx.execute(
        "INSERT INTO status_history (id, device_id, status_type, payload, timestamp)
         VALUES ($1, $2, $3, $4, $5)",
        &[&Uuid::new_v4(), &device_id, &status_type, payload, &timestamp],
    )
    .await
    .map_err(|e| DomainError::RepositoryError(e.into()))?;

    Ok(())
}
