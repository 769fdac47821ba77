#![cfg(feature = "integration-tests")]

use anyhow::Result;
use common::domain::{CommandKind, DeviceCommand, DeviceId, DevicePublisher};
use common::postgres::{MigrationRunner, PostgresClient, PostgresConfig, PostgresTelemetryStore};
use device_bridge::mqtt::BrokerConfig;
use device_bridge::{DeviceBridge, DeviceBridgeConfig};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const CUSTOMER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";
const DEVICE_ID: &str = "AA:BB:CC:DD:EE:FF";

/// Eclipse Mosquitto 2 with anonymous access on all interfaces
#[derive(Debug, Clone)]
struct Mosquitto {
    ports: Vec<ContainerPort>,
}

impl Default for Mosquitto {
    fn default() -> Self {
        Self {
            ports: vec![ContainerPort::Tcp(1883)],
        }
    }
}

impl Image for Mosquitto {
    fn name(&self) -> &str {
        "eclipse-mosquitto"
    }

    fn tag(&self) -> &str {
        "2.0"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::seconds(2)]
    }

    fn cmd(&self) -> impl IntoIterator<Item = impl Into<std::borrow::Cow<'_, str>>> {
        vec!["mosquitto", "-c", "/mosquitto-no-auth.conf"]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &self.ports
    }
}

struct Harness {
    _postgres: ContainerAsync<Postgres>,
    _mosquitto: ContainerAsync<Mosquitto>,
    postgres_client: PostgresClient,
    broker_host: String,
    broker_port: u16,
    publisher: Arc<dyn DevicePublisher>,
    shutdown: CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_pipeline() -> Result<Harness> {
    let (postgres, mosquitto) = tokio::join!(
        Postgres::default().start(),
        Mosquitto::default().start()
    );
    let postgres = postgres?;
    let mosquitto = mosquitto?;

    let postgres_client = PostgresClient::new(&PostgresConfig {
        host: postgres.get_host().await?.to_string(),
        port: postgres.get_host_port_ipv4(5432).await?,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
    })?;
    MigrationRunner::new(postgres_client.clone())
        .run_migrations()
        .await?;
    seed_device(&postgres_client).await?;

    let broker_host = mosquitto.get_host().await?.to_string();
    let broker_port = mosquitto.get_host_port_ipv4(1883).await?;

    let bridge = DeviceBridge::new(
        DeviceBridgeConfig {
            broker: BrokerConfig {
                host: broker_host.clone(),
                port: broker_port,
                ..BrokerConfig::default()
            },
            ingest_channel_capacity: 64,
        },
        Arc::new(PostgresTelemetryStore::new(postgres_client.clone())),
    );
    let publisher: Arc<dyn DevicePublisher> = bridge.publisher();

    let shutdown = CancellationToken::new();
    let (broker_process, ingestion_process) = bridge.into_runner_processes();
    tokio::spawn(broker_process(shutdown.clone()));
    tokio::spawn(ingestion_process(shutdown.clone()));

    // let the bridge connect and subscribe
    sleep(Duration::from_secs(2)).await;

    Ok(Harness {
        _postgres: postgres,
        _mosquitto: mosquitto,
        postgres_client,
        broker_host,
        broker_port,
        publisher,
        shutdown,
    })
}

async fn seed_device(client: &PostgresClient) -> Result<()> {
    let conn = client.get_connection().await?;
    let customer_id = Uuid::parse_str(CUSTOMER_ID)?;
    let zone_id = Uuid::new_v4();

    conn.execute(
        "INSERT INTO customers (customer_id, email, password_hash, username) VALUES ($1, 'e2e@example.com', 'x', 'e2e')",
        &[&customer_id],
    )
    .await?;
    conn.execute(
        "INSERT INTO zones (zone_id, customer_id, zone_location_name) VALUES ($1, $2, 'Lab')",
        &[&zone_id, &customer_id],
    )
    .await?;
    conn.execute(
        "INSERT INTO devices (device_id, customer_id, zone_id, ac_brand_name, ac_brand_protocol, firmware_version)
         VALUES ($1, $2, $3, 'Daikin', 'DAIKIN', '1.0.0')",
        &[&DEVICE_ID, &customer_id, &zone_id],
    )
    .await?;
    Ok(())
}

/// Test-side MQTT client; incoming publishes are forwarded on the channel.
async fn device_client(
    harness: &Harness,
    client_id: &str,
) -> (AsyncClient, mpsc::UnboundedReceiver<(String, Vec<u8>)>) {
    let options = MqttOptions::new(client_id, &harness.broker_host, harness.broker_port);
    let (client, mut eventloop) = AsyncClient::new(options, 16);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok(event) = eventloop.poll().await {
            if let Event::Incoming(Packet::Publish(publish)) = event {
                let _ = tx.send((publish.topic.clone(), publish.payload.to_vec()));
            }
        }
    });

    (client, rx)
}

async fn device_row(client: &PostgresClient) -> Result<(String, Option<chrono::DateTime<chrono::Utc>>)> {
    let conn = client.get_connection().await?;
    let row = conn
        .query_one(
            "SELECT firmware_version, last_seen FROM devices WHERE device_id = $1",
            &[&DEVICE_ID],
        )
        .await?;
    Ok((row.get(0), row.get(1)))
}

async fn history_kinds(client: &PostgresClient) -> Result<Vec<String>> {
    let conn = client.get_connection().await?;
    let rows = conn
        .query(
            "SELECT status_type FROM status_history WHERE device_id = $1 ORDER BY timestamp",
            &[&DEVICE_ID],
        )
        .await?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

async fn wait_for_history(client: &PostgresClient, rows: usize) -> Result<Vec<String>> {
    for _ in 0..50 {
        let kinds = history_kinds(client).await?;
        if kinds.len() >= rows {
            return Ok(kinds);
        }
        sleep(Duration::from_millis(200)).await;
    }
    history_kinds(client).await
}

#[tokio::test]
async fn test_telemetry_updates_device_and_appends_history() -> Result<()> {
    let harness = start_pipeline().await?;
    let (client, _rx) = device_client(&harness, "e2e-device").await;

    let (_, last_seen_before) = device_row(&harness.postgres_client).await?;
    assert!(last_seen_before.is_none());

    // dropped: unsupported kind, sent first on the same session so it is
    // processed before the valid message
    client
        .publish(
            format!("node/{}/{}/bogus", CUSTOMER_ID, DEVICE_ID),
            QoS::AtLeastOnce,
            false,
            r#"{"firmware_version":"9.9.9"}"#,
        )
        .await?;
    client
        .publish(
            format!("node/{}/{}/telemetry", CUSTOMER_ID, DEVICE_ID),
            QoS::AtLeastOnce,
            false,
            r#"{"firmware_version":"2.0.1"}"#,
        )
        .await?;

    let kinds = wait_for_history(&harness.postgres_client, 1).await?;
    assert_eq!(kinds, vec!["telemetry".to_string()]);

    let (firmware, last_seen) = device_row(&harness.postgres_client).await?;
    assert_eq!(firmware, "2.0.1");
    assert!(last_seen.is_some());

    Ok(())
}

#[tokio::test]
async fn test_lowercase_device_id_and_malformed_payloads() -> Result<()> {
    let harness = start_pipeline().await?;
    let (client, _rx) = device_client(&harness, "e2e-device-2").await;
    let lowercase = DEVICE_ID.to_ascii_lowercase();

    for (kind, body) in [
        ("status", "not json"),
        ("status", "[1, 2, 3]"),
        ("status", r#"{"power":"on","temperature":22}"#),
    ] {
        client
            .publish(
                format!("node/{}/{}/{}", CUSTOMER_ID, lowercase, kind),
                QoS::AtLeastOnce,
                false,
                body,
            )
            .await?;
    }

    let kinds = wait_for_history(&harness.postgres_client, 1).await?;
    assert_eq!(kinds, vec!["status".to_string()]);

    let (firmware, last_seen) = device_row(&harness.postgres_client).await?;
    assert_eq!(firmware, "1.0.0");
    assert!(last_seen.is_some());

    Ok(())
}

#[tokio::test]
async fn test_command_reaches_device_topic() -> Result<()> {
    let harness = start_pipeline().await?;
    let (client, mut rx) = device_client(&harness, "e2e-listener").await;
    client
        .subscribe(
            format!("node/{}/{}/command/#", CUSTOMER_ID, DEVICE_ID),
            QoS::AtLeastOnce,
        )
        .await?;
    sleep(Duration::from_millis(500)).await;

    let command = DeviceCommand::new(CommandKind::Temperature, "22")?;
    let topic = harness
        .publisher
        .publish_command(
            Uuid::parse_str(CUSTOMER_ID)?,
            &DeviceId::parse(DEVICE_ID)?,
            &command,
        )
        .await?;

    let (received_topic, payload) = timeout(Duration::from_secs(10), rx.recv())
        .await?
        .expect("listener channel closed");

    assert_eq!(received_topic, topic);
    assert_eq!(
        received_topic,
        format!("node/{}/{}/command/temperature", CUSTOMER_ID, DEVICE_ID)
    );
    assert_eq!(payload, b"22");

    // the bridge sees its own command echo on node/#; it must not be recorded
    sleep(Duration::from_millis(500)).await;
    assert!(history_kinds(&harness.postgres_client).await?.is_empty());

    Ok(())
}
