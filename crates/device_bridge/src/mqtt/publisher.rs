use async_trait::async_trait;
use common::domain::{
    CommandKind, DeviceCommand, DeviceId, DevicePublisher, DomainError, DomainResult,
    OtaDirective,
};
use rumqttc::{AsyncClient, QoS};
use tracing::{debug, instrument};
use uuid::Uuid;

/// `{namespace}/{customer}/{device}/command/{kind}`
pub fn command_topic(namespace: &str, customer_id: Uuid, device_id: &DeviceId, kind: CommandKind) -> String {
    format!("{}/{}/{}/command/{}", namespace, customer_id, device_id, kind)
}

/// `{namespace}/{customer}/{device}/ota`
pub fn ota_topic(namespace: &str, customer_id: Uuid, device_id: &DeviceId) -> String {
    format!("{}/{}/{}/ota", namespace, customer_id, device_id)
}

/// Publishes device-bound messages on the shared broker session.
///
/// Publishes are queued on the client without waiting for the broker; a full
/// queue is reported as a publish error.
#[derive(Clone)]
pub struct MqttDevicePublisher {
    client: AsyncClient,
    namespace: String,
}

impl MqttDevicePublisher {
    pub fn new(client: AsyncClient, namespace: String) -> Self {
        Self { client, namespace }
    }

    fn publish(&self, topic: &str, payload: String) -> DomainResult<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.into_bytes())
            .map_err(|e| DomainError::PublishError(e.to_string()))
    }
}

#[async_trait]
impl DevicePublisher for MqttDevicePublisher {
    #[instrument(skip(self, device_id, command), fields(device_id = %device_id, command = %command.kind()))]
    async fn publish_command(
        &self,
        customer_id: Uuid,
        device_id: &DeviceId,
        command: &DeviceCommand,
    ) -> DomainResult<String> {
        let topic = command_topic(&self.namespace, customer_id, device_id, command.kind());
        self.publish(&topic, command.value().to_string())?;
        debug!(topic = %topic, "command published");
        Ok(topic)
    }

    #[instrument(skip(self, device_id, directive), fields(device_id = %device_id, version = %directive.firmware_version()))]
    async fn publish_ota(
        &self,
        customer_id: Uuid,
        device_id: &DeviceId,
        directive: &OtaDirective,
    ) -> DomainResult<String> {
        let topic = ota_topic(&self.namespace, customer_id, device_id);
        self.publish(&topic, directive.payload())?;
        debug!(topic = %topic, "OTA directive published");
        Ok(topic)
    }
}
