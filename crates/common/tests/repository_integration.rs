#![cfg(feature = "integration-tests")]

use chrono::{Duration, Utc};
use common::domain::{
    CreateDeviceRepoInput, CustomerRepository, DeviceId, DeviceRepository, DomainError,
    SnapshotRepository, ZoneRepository,
};
use common::postgres::{
    MigrationRunner, PostgresClient, PostgresConfig, PostgresCustomerRepository,
    PostgresDeviceRepository, PostgresSnapshotRepository, PostgresZoneRepository,
};
use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
    })
    .expect("Failed to create client");

    MigrationRunner::new(client.clone())
        .run_migrations()
        .await
        .expect("Migrations failed");

    (postgres, client)
}

async fn create_customer_with_zone(client: &PostgresClient) -> (Uuid, Uuid) {
    let conn = client.get_connection().await.unwrap();
    let customer_id = Uuid::new_v4();
    let zone_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO customers (customer_id, email, password_hash, username) VALUES ($1, $2, 'x', 'tester')",
        &[&customer_id, &format!("{}@example.com", customer_id)],
    )
    .await
    .unwrap();
    conn.execute(
        "INSERT INTO zones (zone_id, customer_id, zone_location_name) VALUES ($1, $2, 'Lobby')",
        &[&zone_id, &customer_id],
    )
    .await
    .unwrap();
    (customer_id, zone_id)
}

fn device_input(device_id: &str, customer_id: Uuid, zone_id: Uuid) -> CreateDeviceRepoInput {
    CreateDeviceRepoInput {
        device_id: DeviceId::parse(device_id).unwrap(),
        customer_id,
        zone_id,
        ac_brand_name: "Daikin".to_string(),
        ac_brand_protocol: "DAIKIN".to_string(),
        firmware_version: "1.0.0".to_string(),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_migrations_are_idempotent() {
    let (_container, client) = setup_test_db().await;

    let applied = MigrationRunner::new(client.clone())
        .run_migrations()
        .await
        .unwrap();

    assert_eq!(applied, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_create_and_get_device() {
    let (_container, client) = setup_test_db().await;
    let (customer_id, zone_id) = create_customer_with_zone(&client).await;
    let repo = PostgresDeviceRepository::new(client.clone());

    let created = repo
        .create_device(device_input("aa:bb:cc:dd:ee:01", customer_id, zone_id))
        .await
        .unwrap();
    assert_eq!(created.device_id, "AA:BB:CC:DD:EE:01");
    assert_eq!(created.last_seen, None);

    let fetched = repo
        .get_device(&DeviceId::parse("AA:BB:CC:DD:EE:01").unwrap())
        .await
        .unwrap()
        .expect("device should exist");
    assert_eq!(fetched.customer_id, customer_id);
    assert_eq!(fetched.zone_id, zone_id);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_create_duplicate_device() {
    let (_container, client) = setup_test_db().await;
    let (customer_id, zone_id) = create_customer_with_zone(&client).await;
    let repo = PostgresDeviceRepository::new(client.clone());

    repo.create_device(device_input("AA:BB:CC:DD:EE:02", customer_id, zone_id))
        .await
        .unwrap();
    let result = repo
        .create_device(device_input("AA:BB:CC:DD:EE:02", customer_id, zone_id))
        .await;

    assert!(matches!(result, Err(DomainError::DeviceAlreadyExists(_))));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_snapshot_devices_most_recently_updated_first() {
    let (_container, client) = setup_test_db().await;
    let (customer_id, zone_id) = create_customer_with_zone(&client).await;
    let (other_customer, other_zone) = create_customer_with_zone(&client).await;
    let repo = PostgresDeviceRepository::new(client.clone());

    for id in ["AA:BB:CC:DD:EE:10", "AA:BB:CC:DD:EE:11", "AA:BB:CC:DD:EE:12"] {
        repo.create_device(device_input(id, customer_id, zone_id))
            .await
            .unwrap();
    }
    repo.create_device(device_input("AA:BB:CC:DD:EE:99", other_customer, other_zone))
        .await
        .unwrap();

    let conn = client.get_connection().await.unwrap();
    conn.execute(
        "UPDATE devices SET updated_at = NOW() + INTERVAL '1 minute' WHERE device_id = 'AA:BB:CC:DD:EE:11'",
        &[],
    )
    .await
    .unwrap();

    let snapshot = PostgresSnapshotRepository::new(client.clone())
        .customer_snapshot(customer_id, 100)
        .await
        .unwrap();
    let devices = snapshot.devices;

    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].device_id, "AA:BB:CC:DD:EE:11");
    assert!(devices.iter().all(|d| d.customer_id == customer_id));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_snapshot_history_is_limited_and_newest_first() {
    let (_container, client) = setup_test_db().await;
    let (customer_id, zone_id) = create_customer_with_zone(&client).await;
    let devices = PostgresDeviceRepository::new(client.clone());
    devices
        .create_device(device_input("AA:BB:CC:DD:EE:20", customer_id, zone_id))
        .await
        .unwrap();
    devices
        .create_device(device_input("AA:BB:CC:DD:EE:21", customer_id, zone_id))
        .await
        .unwrap();

    let conn = client.get_connection().await.unwrap();
    let base = Utc::now() - Duration::hours(1);
    for i in 0..120i64 {
        let device_id = if i % 2 == 0 {
            "AA:BB:CC:DD:EE:20"
        } else {
            "AA:BB:CC:DD:EE:21"
        };
        conn.execute(
            "INSERT INTO status_history (id, device_id, status_type, payload, timestamp) VALUES ($1, $2, 'status', $3, $4)",
            &[
                &Uuid::new_v4(),
                &device_id,
                &json!({"seq": i}),
                &(base + Duration::seconds(i)),
            ],
        )
        .await
        .unwrap();
    }

    let snapshot = PostgresSnapshotRepository::new(client.clone())
        .customer_snapshot(customer_id, 100)
        .await
        .unwrap();
    let history = snapshot.history;

    assert_eq!(snapshot.devices.len(), 2);
    assert_eq!(history.len(), 100);
    assert_eq!(history[0].payload["seq"], 119);
    assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_snapshot_excludes_other_customers_history() {
    let (_container, client) = setup_test_db().await;
    let (customer_id, zone_id) = create_customer_with_zone(&client).await;
    let (other_customer, other_zone) = create_customer_with_zone(&client).await;
    let devices = PostgresDeviceRepository::new(client.clone());
    devices
        .create_device(device_input("AA:BB:CC:DD:EE:30", customer_id, zone_id))
        .await
        .unwrap();
    devices
        .create_device(device_input("AA:BB:CC:DD:EE:31", other_customer, other_zone))
        .await
        .unwrap();

    let conn = client.get_connection().await.unwrap();
    for device_id in ["AA:BB:CC:DD:EE:30", "AA:BB:CC:DD:EE:31"] {
        conn.execute(
            "INSERT INTO status_history (id, device_id, status_type, payload) VALUES ($1, $2, 'telemetry', $3)",
            &[&Uuid::new_v4(), &device_id, &json!({"owner": device_id})],
        )
        .await
        .unwrap();
    }

    let repo = PostgresSnapshotRepository::new(client.clone());
    let snapshot = repo.customer_snapshot(customer_id, 100).await.unwrap();
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.history[0].device_id, "AA:BB:CC:DD:EE:30");

    let (empty_customer, _) = create_customer_with_zone(&client).await;
    let empty = repo.customer_snapshot(empty_customer, 100).await.unwrap();
    assert!(empty.devices.is_empty());
    assert!(empty.history.is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_customer_and_zone_lookups() {
    let (_container, client) = setup_test_db().await;
    let (customer_id, zone_id) = create_customer_with_zone(&client).await;

    let customers = PostgresCustomerRepository::new(client.clone());
    assert!(customers.customer_exists(customer_id).await.unwrap());
    assert!(!customers.customer_exists(Uuid::new_v4()).await.unwrap());

    let zones = PostgresZoneRepository::new(client.clone());
    let zone = zones.get_zone(zone_id).await.unwrap().expect("zone exists");
    assert_eq!(zone.customer_id, customer_id);
    assert!(zones.get_zone(Uuid::new_v4()).await.unwrap().is_none());
}
