use crate::domain::{CreateDeviceRepoInput, Device, DeviceId, DeviceRepository, DomainError, DomainResult};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

pub(crate) const DEVICE_COLUMNS: &str = "device_id, customer_id, zone_id, ac_brand_name, ac_brand_protocol, \
     firmware_version, last_seen, created_at, updated_at";

/// Device row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub device_id: String,
    pub customer_id: Uuid,
    pub zone_id: Uuid,
    pub ac_brand_name: String,
    pub ac_brand_protocol: String,
    pub firmware_version: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for DeviceRow {
    fn from(row: &Row) -> Self {
        DeviceRow {
            device_id: row.get("device_id"),
            customer_id: row.get("customer_id"),
            zone_id: row.get("zone_id"),
            ac_brand_name: row.get("ac_brand_name"),
            ac_brand_protocol: row.get("ac_brand_protocol"),
            firmware_version: row.get("firmware_version"),
            last_seen: row.get("last_seen"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            device_id: row.device_id,
            customer_id: row.customer_id,
            zone_id: row.zone_id,
            ac_brand_name: row.ac_brand_name,
            ac_brand_protocol: row.ac_brand_protocol,
            firmware_version: row.firmware_version,
            last_seen: row.last_seen,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

/// PostgreSQL implementation of DeviceRepository
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, device_id), fields(device_id = %device_id))]
    async fn get_device(&self, device_id: &DeviceId) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!("SELECT {} FROM devices WHERE device_id = $1", DEVICE_COLUMNS),
                &[&device_id.as_str()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| DeviceRow::from(&row).into()))
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id, customer_id = %input.customer_id, zone_id = %input.zone_id))]
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let result = conn
            .query_one(
                &format!(
                    "INSERT INTO devices (device_id, customer_id, zone_id, ac_brand_name, ac_brand_protocol, firmware_version)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING {}",
                    DEVICE_COLUMNS
                ),
                &[
                    &input.device_id.as_str(),
                    &input.customer_id,
                    &input.zone_id,
                    &input.ac_brand_name,
                    &input.ac_brand_protocol,
                    &input.firmware_version,
                ],
            )
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                if let Some(db_err) = e.as_db_error() {
                    // unique_violation
                    if db_err.code().code() == "23505" {
                        return Err(DomainError::DeviceAlreadyExists(input.device_id.into_inner()));
                    }
                }
                return Err(DomainError::RepositoryError(e.into()));
            }
        };

        debug!(device_id = %input.device_id, "registered device");

        Ok(DeviceRow::from(&row).into())
    }
}
