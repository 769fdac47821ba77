use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::DomainResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub zone_id: Uuid,
    pub customer_id: Uuid,
    pub zone_location_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ZoneRepository: Send + Sync {
    async fn get_zone(&self, zone_id: Uuid) -> DomainResult<Option<Zone>>;
}
