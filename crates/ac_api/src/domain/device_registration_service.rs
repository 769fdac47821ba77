use common::domain::{
    is_valid_firmware_version, CreateDeviceRepoInput, CustomerRepository, Device, DeviceId,
    DeviceRepository, DomainError, DomainResult, Principal, ZoneRepository,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Service request for registering a device under a customer
#[derive(Debug, Clone, Validate)]
pub struct RegisterDeviceRequest {
    #[garde(skip)] // taken from the request path
    pub customer_id: Uuid,
    #[garde(length(min = 1))]
    pub device_id: String,
    #[garde(skip)]
    pub zone_id: Uuid,
    #[garde(length(min = 1, max = 32))]
    pub ac_brand_name: String,
    #[garde(length(min = 1, max = 32))]
    pub ac_brand_protocol: String,
    #[garde(custom(firmware_version_format))]
    pub firmware_version: String,
}

fn firmware_version_format(value: &String, _: &()) -> garde::Result {
    if is_valid_firmware_version(value) {
        Ok(())
    } else {
        Err(garde::Error::new("must look like major.minor.patch"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneValidation {
    pub valid: bool,
    pub message: &'static str,
}

/// Device self-registration and zone checks used by devices during
/// provisioning. Callers are either the owning customer or a device holding
/// the shared secret.
pub struct DeviceRegistrationService {
    device_repository: Arc<dyn DeviceRepository>,
    customer_repository: Arc<dyn CustomerRepository>,
    zone_repository: Arc<dyn ZoneRepository>,
}

impl DeviceRegistrationService {
    pub fn new(
        device_repository: Arc<dyn DeviceRepository>,
        customer_repository: Arc<dyn CustomerRepository>,
        zone_repository: Arc<dyn ZoneRepository>,
    ) -> Self {
        Self {
            device_repository,
            customer_repository,
            zone_repository,
        }
    }

    /// Register a device for a customer.
    /// A customer principal may only register devices for itself; a device
    /// principal may register for any customer. The zone must belong to the
    /// target customer.
    #[instrument(skip(self, principal, request), fields(customer_id = %request.customer_id, device_id = %request.device_id, zone_id = %request.zone_id))]
    pub async fn register_device(
        &self,
        principal: Principal,
        request: RegisterDeviceRequest,
    ) -> DomainResult<Device> {
        common::garde::validate_request(&request)?;
        let device_id = DeviceId::parse(&request.device_id)?;

        require_same_customer(&principal, request.customer_id)?;

        if !self
            .customer_repository
            .customer_exists(request.customer_id)
            .await?
        {
            return Err(DomainError::CustomerNotFound(
                request.customer_id.to_string(),
            ));
        }

        debug!(zone_id = %request.zone_id, "validating zone ownership");
        match self.zone_repository.get_zone(request.zone_id).await? {
            Some(zone) if zone.customer_id == request.customer_id => {}
            _ => {
                return Err(DomainError::ZoneNotFound(format!(
                    "zone {} not found for customer {}",
                    request.zone_id, request.customer_id
                )))
            }
        }

        let device = self
            .device_repository
            .create_device(CreateDeviceRepoInput {
                device_id,
                customer_id: request.customer_id,
                zone_id: request.zone_id,
                ac_brand_name: request.ac_brand_name,
                ac_brand_protocol: request.ac_brand_protocol,
                firmware_version: request.firmware_version,
            })
            .await?;

        info!(device_id = %device.device_id, "device registered");
        Ok(device)
    }

    /// Whether the zone exists and belongs to the customer. A customer
    /// principal asking about another customer's zone is refused.
    #[instrument(skip(self, principal))]
    pub async fn validate_zone(
        &self,
        principal: Principal,
        customer_id: Uuid,
        zone_id: Uuid,
    ) -> DomainResult<ZoneValidation> {
        let belongs = matches!(
            self.zone_repository.get_zone(zone_id).await?,
            Some(zone) if zone.customer_id == customer_id
        );

        if !belongs {
            return Ok(ZoneValidation {
                valid: false,
                message: "Zone does not belong to customer",
            });
        }

        require_same_customer(&principal, customer_id)?;

        debug!("zone validated");
        Ok(ZoneValidation {
            valid: true,
            message: "Zone is valid",
        })
    }
}

fn require_same_customer(principal: &Principal, customer_id: Uuid) -> DomainResult<()> {
    match principal {
        Principal::Customer(customer) if customer.customer_id != customer_id => {
            warn!(
                principal_customer_id = %customer.customer_id,
                target_customer_id = %customer_id,
                "customer acting on another customer"
            );
            Err(DomainError::PermissionDenied("Access denied".to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        CustomerPrincipal, MockCustomerRepository, MockDeviceRepository, MockZoneRepository, Zone,
    };

    fn zone(zone_id: Uuid, customer_id: Uuid) -> Zone {
        Zone {
            zone_id,
            customer_id,
            zone_location_name: "Server room".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    fn request(customer_id: Uuid, zone_id: Uuid) -> RegisterDeviceRequest {
        RegisterDeviceRequest {
            customer_id,
            device_id: "aa:bb:cc:dd:ee:01".to_string(),
            zone_id,
            ac_brand_name: "Daikin".to_string(),
            ac_brand_protocol: "DAIKIN".to_string(),
            firmware_version: "1.0.0".to_string(),
        }
    }

    fn customer(customer_id: Uuid) -> Principal {
        Principal::Customer(CustomerPrincipal { customer_id })
    }

    fn service(
        devices: MockDeviceRepository,
        customers: MockCustomerRepository,
        zones: MockZoneRepository,
    ) -> DeviceRegistrationService {
        DeviceRegistrationService::new(Arc::new(devices), Arc::new(customers), Arc::new(zones))
    }

    #[tokio::test]
    async fn test_device_principal_registers_device() {
        let customer_id = Uuid::new_v4();
        let zone_id = Uuid::new_v4();

        let mut customers = MockCustomerRepository::new();
        customers
            .expect_customer_exists()
            .times(1)
            .return_once(|_| Ok(true));

        let mut zones = MockZoneRepository::new();
        zones
            .expect_get_zone()
            .return_once(move |_| Ok(Some(zone(zone_id, customer_id))));

        let mut devices = MockDeviceRepository::new();
        devices
            .expect_create_device()
            .withf(move |input: &CreateDeviceRepoInput| {
                input.device_id.as_str() == "AA:BB:CC:DD:EE:01"
                    && input.customer_id == customer_id
                    && input.zone_id == zone_id
            })
            .times(1)
            .return_once(|input| {
                Ok(Device {
                    device_id: input.device_id.into_inner(),
                    customer_id: input.customer_id,
                    zone_id: input.zone_id,
                    ac_brand_name: input.ac_brand_name,
                    ac_brand_protocol: input.ac_brand_protocol,
                    firmware_version: input.firmware_version,
                    last_seen: None,
                    created_at: None,
                    updated_at: None,
                })
            });

        let device = service(devices, customers, zones)
            .register_device(Principal::Device, request(customer_id, zone_id))
            .await
            .unwrap();

        assert_eq!(device.device_id, "AA:BB:CC:DD:EE:01");
        assert!(device.last_seen.is_none());
    }

    #[tokio::test]
    async fn test_customer_cannot_register_for_another_customer() {
        let mut customers = MockCustomerRepository::new();
        customers.expect_customer_exists().times(0);

        let result = service(MockDeviceRepository::new(), customers, MockZoneRepository::new())
            .register_device(
                customer(Uuid::new_v4()),
                request(Uuid::new_v4(), Uuid::new_v4()),
            )
            .await;

        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_zone_of_other_customer_is_rejected() {
        let customer_id = Uuid::new_v4();
        let zone_id = Uuid::new_v4();

        let mut customers = MockCustomerRepository::new();
        customers.expect_customer_exists().return_once(|_| Ok(true));
        let mut zones = MockZoneRepository::new();
        zones
            .expect_get_zone()
            .return_once(move |_| Ok(Some(zone(zone_id, Uuid::new_v4()))));
        let mut devices = MockDeviceRepository::new();
        devices.expect_create_device().times(0);

        let result = service(devices, customers, zones)
            .register_device(customer(customer_id), request(customer_id, zone_id))
            .await;

        assert!(matches!(result, Err(DomainError::ZoneNotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_customer_is_rejected() {
        let mut customers = MockCustomerRepository::new();
        customers.expect_customer_exists().return_once(|_| Ok(false));

        let result = service(MockDeviceRepository::new(), customers, MockZoneRepository::new())
            .register_device(Principal::Device, request(Uuid::new_v4(), Uuid::new_v4()))
            .await;

        assert!(matches!(result, Err(DomainError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_fields_are_rejected() {
        let mut bad_version = request(Uuid::new_v4(), Uuid::new_v4());
        bad_version.firmware_version = "1.0".to_string();
        let mut bad_brand = request(Uuid::new_v4(), Uuid::new_v4());
        bad_brand.ac_brand_name = "x".repeat(33);

        for request in [bad_version, bad_brand] {
            let result = service(
                MockDeviceRepository::new(),
                MockCustomerRepository::new(),
                MockZoneRepository::new(),
            )
            .register_device(Principal::Device, request)
            .await;
            assert!(matches!(result, Err(DomainError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_duplicate_device_propagates() {
        let customer_id = Uuid::new_v4();
        let zone_id = Uuid::new_v4();

        let mut customers = MockCustomerRepository::new();
        customers.expect_customer_exists().return_once(|_| Ok(true));
        let mut zones = MockZoneRepository::new();
        zones
            .expect_get_zone()
            .return_once(move |_| Ok(Some(zone(zone_id, customer_id))));
        let mut devices = MockDeviceRepository::new();
        devices.expect_create_device().return_once(|input| {
            Err(DomainError::DeviceAlreadyExists(
                input.device_id.into_inner(),
            ))
        });

        let result = service(devices, customers, zones)
            .register_device(Principal::Device, request(customer_id, zone_id))
            .await;

        assert!(matches!(result, Err(DomainError::DeviceAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_validate_zone() {
        let customer_id = Uuid::new_v4();
        let zone_id = Uuid::new_v4();

        let mut zones = MockZoneRepository::new();
        zones
            .expect_get_zone()
            .times(3)
            .returning(move |_| Ok(Some(zone(zone_id, customer_id))));
        let service = service(
            MockDeviceRepository::new(),
            MockCustomerRepository::new(),
            zones,
        );

        let valid = service
            .validate_zone(Principal::Device, customer_id, zone_id)
            .await
            .unwrap();
        assert!(valid.valid);

        let other = service
            .validate_zone(Principal::Device, Uuid::new_v4(), zone_id)
            .await
            .unwrap();
        assert!(!other.valid);

        let denied = service
            .validate_zone(customer(Uuid::new_v4()), customer_id, zone_id)
            .await;
        assert!(matches!(denied, Err(DomainError::PermissionDenied(_))));
    }
}
