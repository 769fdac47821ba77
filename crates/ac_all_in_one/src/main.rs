mod config;

use ac_api::{
    AcApi, AppState, DeviceControlService, DeviceRegistrationService, HttpServerConfig,
    RealtimeSnapshotService,
};
use ac_runner::Runner;
use common::auth::{CredentialGate, JwtAuthTokenProvider, JwtConfig};
use common::postgres::{
    MigrationRunner, PostgresClient, PostgresConfig, PostgresCustomerRepository,
    PostgresDeviceRepository, PostgresSnapshotRepository, PostgresTelemetryStore,
    PostgresZoneRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use crate::config::ServiceConfig;
use device_bridge::mqtt::{parse_broker_url, BrokerConfig};
use device_bridge::{DeviceBridge, DeviceBridgeConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        http_port = config.http_port,
        mqtt_host = %config.mqtt_host,
        namespace = %config.mqtt_topic_namespace,
        "Starting ac-all-in-one service"
    );

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to initialize PostgreSQL");
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let broker_config = match build_broker_config(&config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid broker configuration");
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    // Repositories
    let device_repository = Arc::new(PostgresDeviceRepository::new(postgres_client.clone()));
    let customer_repository = Arc::new(PostgresCustomerRepository::new(postgres_client.clone()));
    let zone_repository = Arc::new(PostgresZoneRepository::new(postgres_client.clone()));
    let snapshot_repository = Arc::new(PostgresSnapshotRepository::new(postgres_client.clone()));
    let telemetry_store = Arc::new(PostgresTelemetryStore::new(postgres_client.clone()));

    // Broker bridge owns the single broker session; the command publisher shares it
    let device_bridge = DeviceBridge::new(
        DeviceBridgeConfig {
            broker: broker_config,
            ingest_channel_capacity: config.ingest_channel_capacity,
        },
        telemetry_store,
    );
    let device_publisher = device_bridge.publisher();

    let token_provider = Arc::new(JwtAuthTokenProvider::new(JwtConfig::new(
        config.jwt_secret.clone(),
    )));
    let credential_gate = Arc::new(CredentialGate::new(
        token_provider,
        customer_repository.clone(),
        config.device_secret.clone(),
    ));

    let state = AppState {
        credential_gate,
        device_control: Arc::new(DeviceControlService::new(
            device_repository.clone(),
            device_publisher,
        )),
        registration: Arc::new(DeviceRegistrationService::new(
            device_repository,
            customer_repository,
            zone_repository,
        )),
        snapshots: Arc::new(
            RealtimeSnapshotService::new(snapshot_repository)
                .with_history_limit(config.broadcast_history_limit),
        ),
        health: Arc::new(postgres_client.clone()),
        broadcast_interval: Duration::from_secs(config.broadcast_interval_secs),
    };

    let ac_api = AcApi::new(
        state,
        HttpServerConfig {
            host: config.http_host.clone(),
            port: config.http_port,
        },
    );

    let (broker_process, ingestion_process) = device_bridge.into_runner_processes();

    Runner::new()
        .with_named_process("ac_api", ac_api.into_runner_process())
        .with_named_process("broker_bridge", broker_process)
        .with_named_process("telemetry_ingestion", ingestion_process)
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            postgres_client.close();
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .run()
        .await;
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    info!("Initializing PostgreSQL...");
    let client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_connections,
    })?;
    client.ping().await?;

    if config.run_migrations {
        let applied = MigrationRunner::new(client.clone()).run_migrations().await?;
        info!(applied, "PostgreSQL migrations complete");
    }

    Ok(client)
}

/// An explicit port in `mqtt_host` wins over `mqtt_port`.
fn build_broker_config(config: &ServiceConfig) -> anyhow::Result<BrokerConfig> {
    let (host, parsed_port) = parse_broker_url(&config.mqtt_host)?;
    let has_explicit_port = config
        .mqtt_host
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://")
        .contains(':');

    Ok(BrokerConfig {
        host,
        port: if has_explicit_port {
            parsed_port
        } else {
            config.mqtt_port
        },
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        use_tls: config.mqtt_use_tls,
        keep_alive: Duration::from_secs(config.mqtt_keep_alive_secs),
        namespace: config.mqtt_topic_namespace.clone(),
        reconnect_initial_delay: Duration::from_secs(config.mqtt_reconnect_initial_secs),
        reconnect_max_delay: Duration::from_secs(config.mqtt_reconnect_max_secs),
        ..BrokerConfig::default()
    })
}
