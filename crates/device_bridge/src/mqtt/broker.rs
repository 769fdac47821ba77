use std::time::Duration;

use common::domain::{DomainError, DomainResult};
use rumqttc::{AsyncClient, EventLoop, MqttOptions, Transport};

const DEFAULT_MQTT_PORT: u16 = 1883;

/// Connection settings for the device broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub keep_alive: Duration,
    /// First topic segment of every device topic
    pub namespace: String,
    pub client_id: String,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Capacity of the client's outgoing request queue
    pub request_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            use_tls: false,
            keep_alive: Duration::from_secs(60),
            namespace: "node".to_string(),
            client_id: format!("backend_{}", uuid::Uuid::new_v4().simple()),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(120),
            request_capacity: 100,
        }
    }
}

impl BrokerConfig {
    /// Wildcard covering every device topic in the namespace
    pub fn subscription_filter(&self) -> String {
        format!("{}/#", self.namespace)
    }
}

/// Build the broker client. Nothing touches the network until the event loop
/// is polled.
pub fn connect(config: &BrokerConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);

    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }
    if config.use_tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    AsyncClient::new(options, config.request_capacity)
}

/// Parse a broker address: `mqtt://host:port`, `tcp://host:port`, `host:port` or `host`
pub fn parse_broker_url(url: &str) -> DomainResult<(String, u16)> {
    let address = url
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://");

    match address.split_once(':') {
        None if !address.is_empty() => Ok((address.to_string(), DEFAULT_MQTT_PORT)),
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::ValidationError(format!("invalid port in broker URL: {}", port))
            })?;
            Ok((host.to_string(), port))
        }
        _ => Err(DomainError::ValidationError(format!(
            "invalid broker URL: {}",
            url
        ))),
    }
}

/// Exponential reconnect delay, doubling from `initial` up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Called after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
