use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use crate::domain::{DeviceId, DomainError, DomainResult};

static FIRMWARE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("static version pattern compiles"));

/// `major.minor.patch`, digits only.
pub fn is_valid_firmware_version(version: &str) -> bool {
    FIRMWARE_VERSION.is_match(version)
}

const POWER_VALUES: &[&str] = &["on", "off"];
const MODE_VALUES: &[&str] = &["auto", "cool", "heat", "dry", "fan"];
const FAN_SPEED_VALUES: &[&str] = &["auto", "low", "medium", "high"];
const MIN_TEMPERATURE: i32 = 16;
const MAX_TEMPERATURE: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Power,
    Mode,
    Temperature,
    FanSpeed,
}

impl CommandKind {
    /// Name used on the wire, both in requests and as the last topic segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Power => "power",
            CommandKind::Mode => "mode",
            CommandKind::Temperature => "temperature",
            CommandKind::FanSpeed => "fanspeed",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "power" => Ok(CommandKind::Power),
            "mode" => Ok(CommandKind::Mode),
            "temperature" => Ok(CommandKind::Temperature),
            "fanspeed" => Ok(CommandKind::FanSpeed),
            other => Err(DomainError::InvalidCommand(format!(
                "unknown command: {}",
                other
            ))),
        }
    }
}

/// A control command whose value has been checked against its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    kind: CommandKind,
    value: String,
}

impl DeviceCommand {
    pub fn new(kind: CommandKind, value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        match kind {
            CommandKind::Power => require_one_of(kind, &value, POWER_VALUES)?,
            CommandKind::Mode => require_one_of(kind, &value, MODE_VALUES)?,
            CommandKind::FanSpeed => require_one_of(kind, &value, FAN_SPEED_VALUES)?,
            CommandKind::Temperature => {
                let degrees: i32 = value.parse().map_err(|_| {
                    DomainError::InvalidCommand(format!(
                        "temperature must be an integer, got '{}'",
                        value
                    ))
                })?;
                if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&degrees) {
                    return Err(DomainError::InvalidCommand(format!(
                        "temperature must be between {} and {}, got {}",
                        MIN_TEMPERATURE, MAX_TEMPERATURE, degrees
                    )));
                }
            }
        }
        Ok(Self { kind, value })
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Raw value as supplied by the operator; this is the published body.
    pub fn value(&self) -> &str {
        &self.value
    }
}

fn require_one_of(kind: CommandKind, value: &str, allowed: &[&str]) -> DomainResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(DomainError::InvalidCommand(format!(
            "invalid {} value '{}', expected one of: {}",
            kind,
            value,
            allowed.join(", ")
        )))
    }
}

/// Firmware update instruction sent to a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaDirective {
    firmware_url: String,
    firmware_version: String,
}

impl OtaDirective {
    pub fn new(
        firmware_url: impl Into<String>,
        firmware_version: impl Into<String>,
    ) -> DomainResult<Self> {
        let firmware_url = firmware_url.into();
        let firmware_version = firmware_version.into();

        if firmware_url.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "firmware_url must not be empty".to_string(),
            ));
        }
        if !is_valid_firmware_version(&firmware_version) {
            return Err(DomainError::InvalidFirmwareVersion(firmware_version));
        }

        Ok(Self {
            firmware_url,
            firmware_version,
        })
    }

    pub fn firmware_url(&self) -> &str {
        &self.firmware_url
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    /// Body published to the device: `<url>,<version>`.
    pub fn payload(&self) -> String {
        format!("{},{}", self.firmware_url, self.firmware_version)
    }
}

/// Outbound transport for device-bound messages. Returns the topic the
/// message was published on.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DevicePublisher: Send + Sync {
    async fn publish_command(
        &self,
        customer_id: Uuid,
        device_id: &DeviceId,
        command: &DeviceCommand,
    ) -> DomainResult<String>;

    async fn publish_ota(
        &self,
        customer_id: Uuid,
        device_id: &DeviceId,
        directive: &OtaDirective,
    ) -> DomainResult<String>;
}
