use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // OpenTelemetry configuration
    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_connections")]
    pub postgres_max_connections: usize,

    /// Apply embedded schema migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    // MQTT configuration
    /// Broker host; `mqtt://host:port` and `host:port` are also accepted
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,

    /// Used when `mqtt_host` carries no port
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    #[serde(default)]
    pub mqtt_username: Option<String>,

    #[serde(default)]
    pub mqtt_password: Option<String>,

    #[serde(default)]
    pub mqtt_use_tls: bool,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// First segment of every device topic
    #[serde(default = "default_mqtt_topic_namespace")]
    pub mqtt_topic_namespace: String,

    #[serde(default = "default_mqtt_reconnect_initial_secs")]
    pub mqtt_reconnect_initial_secs: u64,

    #[serde(default = "default_mqtt_reconnect_max_secs")]
    pub mqtt_reconnect_max_secs: u64,

    /// Bound of the broker -> ingestion handoff channel
    #[serde(default = "default_ingest_channel_capacity")]
    pub ingest_channel_capacity: usize,

    // Auth configuration
    /// JWT signing secret (required)
    #[serde(default)]
    pub jwt_secret: String,

    /// Shared secret devices present in the `x-device-secret` header (required)
    #[serde(default)]
    pub device_secret: String,

    // Real-time feed configuration
    #[serde(default = "default_broadcast_interval_secs")]
    pub broadcast_interval_secs: u64,

    #[serde(default = "default_broadcast_history_limit")]
    pub broadcast_history_limit: i64,

    /// Upper bound for cleanup after shutdown starts
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}
fn default_otel_service_name() -> String {
    "ac-control".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8000
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}
fn default_postgres_port() -> u16 {
    5432
}
fn default_postgres_database() -> String {
    "ac_control".to_string()
}
fn default_postgres_username() -> String {
    "postgres".to_string()
}
fn default_postgres_password() -> String {
    "postgres".to_string()
}
fn default_postgres_max_connections() -> usize {
    10
}
fn default_run_migrations() -> bool {
    true
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_mqtt_keep_alive_secs() -> u64 {
    60
}
fn default_mqtt_topic_namespace() -> String {
    "node".to_string()
}
fn default_mqtt_reconnect_initial_secs() -> u64 {
    1
}
fn default_mqtt_reconnect_max_secs() -> u64 {
    120
}
fn default_ingest_channel_capacity() -> usize {
    1024
}

fn default_broadcast_interval_secs() -> u64 {
    5
}
fn default_broadcast_history_limit() -> i64 {
    100
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("ACCTL"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "ACCTL_JWT_SECRET must be set".to_string(),
            ));
        }
        if self.device_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "ACCTL_DEVICE_SECRET must be set".to_string(),
            ));
        }
        if self.mqtt_reconnect_max_secs < self.mqtt_reconnect_initial_secs {
            return Err(ConfigError::Message(format!(
                "mqtt_reconnect_max_secs ({}) is below mqtt_reconnect_initial_secs ({})",
                self.mqtt_reconnect_max_secs, self.mqtt_reconnect_initial_secs
            )));
        }
        if self.ingest_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "ingest_channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
