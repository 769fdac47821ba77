use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Append-only record of one accepted device message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusHistoryRecord {
    pub id: Uuid,
    pub device_id: String,
    pub status_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
