mod broker;
mod publisher;
pub(crate) mod subscriber;
mod topic;

pub use broker::{connect, parse_broker_url, Backoff, BrokerConfig};
pub use publisher::{command_topic, ota_topic, MqttDevicePublisher};
pub use subscriber::run_broker_bridge;
pub use topic::{parse_inbound, TopicError};
