use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{DeviceId, DomainError, DomainResult};

const FIRMWARE_VERSION_FIELD: &str = "firmware_version";

/// Kind of device-originated message, taken from the last topic segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Status,
    Telemetry,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Status => "status",
            MessageKind::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(MessageKind::Status),
            "telemetry" => Ok(MessageKind::Telemetry),
            other => Err(DomainError::ValidationError(format!(
                "unsupported message kind: {}",
                other
            ))),
        }
    }
}

/// A validated device message, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub customer_id: Uuid,
    pub device_id: DeviceId,
    pub kind: MessageKind,
    pub payload: Map<String, Value>,
    pub received_at: DateTime<Utc>,
}

impl TelemetryEvent {
    /// Firmware reported by a telemetry message. Status messages never update
    /// firmware, and only string values are taken.
    pub fn reported_firmware(&self) -> Option<&str> {
        if self.kind != MessageKind::Telemetry {
            return None;
        }
        self.payload
            .get(FIRMWARE_VERSION_FIELD)
            .and_then(Value::as_str)
    }

    /// Build the write applied by the telemetry store.
    pub fn into_write(self) -> TelemetryWrite {
        let firmware_version = self.reported_firmware().map(str::to_string);
        TelemetryWrite {
            device_id: self.device_id,
            kind: self.kind,
            firmware_version,
            payload: Value::Object(self.payload),
            received_at: self.received_at,
        }
    }
}

/// Field updates and history row produced from one event.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryWrite {
    pub device_id: DeviceId,
    pub kind: MessageKind,
    pub firmware_version: Option<String>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    UnknownDevice,
}

/// Applies a telemetry write atomically: device lookup, last-seen and firmware
/// update, history append. An unknown device results in no writes at all.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn record_telemetry(&self, write: TelemetryWrite) -> DomainResult<RecordOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: MessageKind, payload: Value) -> TelemetryEvent {
        TelemetryEvent {
            customer_id: Uuid::new_v4(),
            device_id: DeviceId::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            kind,
            payload: payload.as_object().cloned().unwrap(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_message_kind_parse() {
        assert_eq!("status".parse::<MessageKind>().unwrap(), MessageKind::Status);
        assert_eq!(
            "telemetry".parse::<MessageKind>().unwrap(),
            MessageKind::Telemetry
        );
        assert!("Status".parse::<MessageKind>().is_err());
        assert!("bogus".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_telemetry_with_firmware_updates_firmware() {
        let write = event(
            MessageKind::Telemetry,
            json!({"firmware_version": "2.0.1", "temp": 22}),
        )
        .into_write();

        assert_eq!(write.firmware_version.as_deref(), Some("2.0.1"));
        assert_eq!(write.payload["temp"], 22);
    }

    #[test]
    fn test_status_with_firmware_does_not_update_firmware() {
        let write = event(MessageKind::Status, json!({"firmware_version": "2.0.1"})).into_write();

        assert_eq!(write.firmware_version, None);
        assert_eq!(write.payload["firmware_version"], "2.0.1");
    }

    #[test]
    fn test_non_string_firmware_is_ignored() {
        let write = event(MessageKind::Telemetry, json!({"firmware_version": 2})).into_write();
        assert_eq!(write.firmware_version, None);
    }

    #[test]
    fn test_write_keeps_receipt_time() {
        let event = event(MessageKind::Telemetry, json!({}));
        let received_at = event.received_at;
        assert_eq!(event.into_write().received_at, received_at);
    }
}
