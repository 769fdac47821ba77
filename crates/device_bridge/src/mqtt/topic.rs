use chrono::{DateTime, Utc};
use common::domain::{DeviceId, MessageKind, TelemetryEvent};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Why an inbound message was dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopicError {
    #[error("topic '{0}' has fewer than four segments")]
    TooFewSegments(String),

    #[error("topic '{0}' has more than four segments")]
    TooManySegments(String),

    #[error("topic namespace '{0}' is not served")]
    UnknownNamespace(String),

    #[error("customer id '{0}' is not a UUID")]
    InvalidCustomerId(String),

    #[error("device id '{0}' is not a MAC address")]
    InvalidDeviceId(String),

    #[error("unsupported message kind '{0}'")]
    UnsupportedKind(String),

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is JSON but not an object")]
    NotAnObject,
}

impl TopicError {
    /// Our own command and OTA publications come back through the wildcard
    /// subscription; they are expected and not worth a warning.
    pub fn is_outbound_echo(&self) -> bool {
        match self {
            TopicError::UnsupportedKind(kind) => kind == "ota",
            TopicError::TooManySegments(topic) => topic.split('/').nth(3) == Some("command"),
            _ => false,
        }
    }
}

/// Parse a raw broker message into a [`TelemetryEvent`].
///
/// The topic must be exactly `{namespace}/{customer_uuid}/{device_mac}/{kind}`
/// with kind `status` or `telemetry`, and the body a UTF-8 JSON object. The
/// device id is normalized to uppercase.
///
/// # Examples
/// ```
/// use device_bridge::mqtt::parse_inbound;
///
/// let event = parse_inbound(
///     "node",
///     "node/123e4567-e89b-12d3-a456-426614174000/aa:bb:cc:dd:ee:ff/status",
///     br#"{"power":"on"}"#,
///     chrono::Utc::now(),
/// )
/// .unwrap();
/// assert_eq!(event.device_id.as_str(), "AA:BB:CC:DD:EE:FF");
/// ```
pub fn parse_inbound(
    namespace: &str,
    topic: &str,
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Result<TelemetryEvent, TopicError> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 4 {
        return Err(TopicError::TooFewSegments(topic.to_string()));
    }
    if segments.len() > 4 {
        return Err(TopicError::TooManySegments(topic.to_string()));
    }

    if segments[0] != namespace {
        return Err(TopicError::UnknownNamespace(segments[0].to_string()));
    }

    let customer_id = Uuid::parse_str(segments[1])
        .map_err(|_| TopicError::InvalidCustomerId(segments[1].to_string()))?;

    let device_id = DeviceId::parse(segments[2])
        .map_err(|_| TopicError::InvalidDeviceId(segments[2].to_string()))?;

    let kind: MessageKind = segments[3]
        .parse()
        .map_err(|_| TopicError::UnsupportedKind(segments[3].to_string()))?;

    let body = std::str::from_utf8(payload).map_err(|_| TopicError::InvalidUtf8)?;
    let payload = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(TopicError::NotAnObject),
        Err(e) => return Err(TopicError::InvalidJson(e.to_string())),
    };

    Ok(TelemetryEvent {
        customer_id,
        device_id,
        kind,
        payload,
        received_at,
    })
}
