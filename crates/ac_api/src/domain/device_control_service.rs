use common::domain::{
    CommandKind, Device, DeviceCommand, DeviceId, DevicePublisher, DeviceRepository, DomainError,
    DomainResult, OtaDirective,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Service request for sending a control command
#[derive(Debug, Clone, Validate)]
pub struct SendCommandRequest {
    #[garde(skip)] // customer resolved by the credential gate
    pub customer_id: Uuid,
    #[garde(length(min = 1))]
    pub device_id: String,
    #[garde(length(min = 1))]
    pub command: String,
    #[garde(skip)] // checked per command kind
    pub value: String,
}

/// Service request for starting a firmware update
#[derive(Debug, Clone, Validate)]
pub struct StartOtaRequest {
    #[garde(skip)]
    pub customer_id: Uuid,
    #[garde(length(min = 1))]
    pub device_id: String,
    #[garde(length(min = 1))]
    pub firmware_url: String,
    #[garde(skip)]
    pub firmware_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReceipt {
    pub topic: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaReceipt {
    pub topic: String,
    pub firmware_url: String,
    pub firmware_version: String,
}

/// Validates operator commands and firmware directives, checks device
/// ownership and hands them to the device publisher.
pub struct DeviceControlService {
    device_repository: Arc<dyn DeviceRepository>,
    publisher: Arc<dyn DevicePublisher>,
}

impl DeviceControlService {
    pub fn new(
        device_repository: Arc<dyn DeviceRepository>,
        publisher: Arc<dyn DevicePublisher>,
    ) -> Self {
        Self {
            device_repository,
            publisher,
        }
    }

    /// A rejected command is never published. Publishing is fire-and-forget;
    /// the receipt only says the broker client accepted the message.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, device_id = %request.device_id, command = %request.command))]
    pub async fn send_command(&self, request: SendCommandRequest) -> DomainResult<CommandReceipt> {
        common::garde::validate_request(&request)?;

        let device_id = DeviceId::parse(&request.device_id)?;
        let kind: CommandKind = request.command.parse()?;
        let command = DeviceCommand::new(kind, request.value)?;

        self.ensure_owned(request.customer_id, &device_id).await?;

        let topic = self
            .publisher
            .publish_command(request.customer_id, &device_id, &command)
            .await?;

        info!(topic = %topic, value = %command.value(), "command sent");
        Ok(CommandReceipt {
            topic,
            value: command.value().to_string(),
        })
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, device_id = %request.device_id, firmware_version = %request.firmware_version))]
    pub async fn start_ota(&self, request: StartOtaRequest) -> DomainResult<OtaReceipt> {
        common::garde::validate_request(&request)?;

        let device_id = DeviceId::parse(&request.device_id)?;
        let directive = OtaDirective::new(request.firmware_url, request.firmware_version)?;

        self.ensure_owned(request.customer_id, &device_id).await?;

        let topic = self
            .publisher
            .publish_ota(request.customer_id, &device_id, &directive)
            .await?;

        info!(topic = %topic, "OTA update initiated");
        Ok(OtaReceipt {
            topic,
            firmware_url: directive.firmware_url().to_string(),
            firmware_version: directive.firmware_version().to_string(),
        })
    }

    /// Devices owned by another customer are reported as missing.
    async fn ensure_owned(&self, customer_id: Uuid, device_id: &DeviceId) -> DomainResult<Device> {
        debug!(device_id = %device_id, "checking device ownership");
        match self.device_repository.get_device(device_id).await? {
            Some(device) if device.customer_id == customer_id => Ok(device),
            Some(device) => {
                warn!(
                    device_id = %device_id,
                    owner_id = %device.customer_id,
                    "device belongs to another customer"
                );
                Err(DomainError::DeviceNotFound(device_id.to_string()))
            }
            None => Err(DomainError::DeviceNotFound(device_id.to_string())),
        }
    }
}
