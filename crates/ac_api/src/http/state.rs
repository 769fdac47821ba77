use async_trait::async_trait;
use common::auth::CredentialGate;
use common::postgres::PostgresClient;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{DeviceControlService, DeviceRegistrationService, RealtimeSnapshotService};

/// Liveness check for the backing store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl HealthCheck for PostgresClient {
    async fn check(&self) -> anyhow::Result<()> {
        self.ping().await
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub credential_gate: Arc<CredentialGate>,
    pub device_control: Arc<DeviceControlService>,
    pub registration: Arc<DeviceRegistrationService>,
    pub snapshots: Arc<RealtimeSnapshotService>,
    pub health: Arc<dyn HealthCheck>,
    pub broadcast_interval: Duration,
}
