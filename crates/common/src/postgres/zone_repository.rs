use crate::domain::{DomainError, DomainResult, Zone, ZoneRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresZoneRepository {
    client: PostgresClient,
}

impl PostgresZoneRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ZoneRepository for PostgresZoneRepository {
    #[instrument(skip(self, zone_id), fields(zone_id = %zone_id))]
    async fn get_zone(&self, zone_id: Uuid) -> DomainResult<Option<Zone>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT zone_id, customer_id, zone_location_name, created_at, updated_at
                 FROM zones
                 WHERE zone_id = $1",
                &[&zone_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| Zone {
            zone_id: row.get("zone_id"),
            customer_id: row.get("customer_id"),
            zone_location_name: row.get("zone_location_name"),
            created_at: Some(row.get("created_at")),
            updated_at: Some(row.get("updated_at")),
        }))
    }
}
