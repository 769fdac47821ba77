use std::sync::Arc;

use ac_runner::AppProcess;
use common::domain::TelemetryStore;
use rumqttc::{AsyncClient, EventLoop};
use tracing::debug;

use crate::domain::{run_ingestion_worker, IngestHandoff, TelemetryIngestionService};
use crate::mqtt::{connect, run_broker_bridge, BrokerConfig, MqttDevicePublisher};

pub struct DeviceBridgeConfig {
    pub broker: BrokerConfig,
    pub ingest_channel_capacity: usize,
}

/// Owns the broker session and the ingestion pipeline behind it.
pub struct DeviceBridge {
    client: AsyncClient,
    eventloop: EventLoop,
    handoff: Arc<IngestHandoff>,
    ingestion_service: Arc<TelemetryIngestionService>,
    config: DeviceBridgeConfig,
}

impl DeviceBridge {
    pub fn new(config: DeviceBridgeConfig, telemetry_store: Arc<dyn TelemetryStore>) -> Self {
        debug!(
            host = %config.broker.host,
            port = config.broker.port,
            namespace = %config.broker.namespace,
            "initializing device bridge"
        );
        let (client, eventloop) = connect(&config.broker);

        Self {
            client,
            eventloop,
            handoff: Arc::new(IngestHandoff::new()),
            ingestion_service: Arc::new(TelemetryIngestionService::new(telemetry_store)),
            config,
        }
    }

    /// Outbound publisher sharing this bridge's broker session.
    pub fn publisher(&self) -> Arc<MqttDevicePublisher> {
        Arc::new(MqttDevicePublisher::new(
            self.client.clone(),
            self.config.broker.namespace.clone(),
        ))
    }

    /// Split into the broker process and the ingestion worker process.
    pub fn into_runner_processes(self) -> (AppProcess, AppProcess) {
        let broker: AppProcess = Box::new({
            let client = self.client;
            let eventloop = self.eventloop;
            let broker_config = self.config.broker;
            let handoff = Arc::clone(&self.handoff);
            move |ctx| {
                Box::pin(async move {
                    run_broker_bridge(client, eventloop, broker_config, handoff, ctx).await
                })
            }
        });

        let ingestion: AppProcess = Box::new({
            let handoff = self.handoff;
            let service = self.ingestion_service;
            let capacity = self.config.ingest_channel_capacity;
            move |ctx| {
                Box::pin(async move { run_ingestion_worker(handoff, service, capacity, ctx).await })
            }
        });

        (broker, ingestion)
    }
}
