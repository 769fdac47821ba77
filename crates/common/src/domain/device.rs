use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult};

static MAC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("static MAC pattern compiles")
});

/// Canonical device identifier: a colon separated 6-octet hardware address in
/// uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if !MAC_ADDRESS.is_match(raw) {
            return Err(DomainError::InvalidDeviceId(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device domain entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub device_id: String,
    pub customer_id: Uuid,
    pub zone_id: Uuid,
    pub ac_brand_name: String,
    pub ac_brand_protocol: String,
    pub firmware_version: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Repository input for registering a device
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDeviceRepoInput {
    pub device_id: DeviceId,
    pub customer_id: Uuid,
    pub zone_id: Uuid,
    pub ac_brand_name: String,
    pub ac_brand_protocol: String,
    pub firmware_version: String,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn get_device(&self, device_id: &DeviceId) -> DomainResult<Option<Device>>;

    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device>;
}
