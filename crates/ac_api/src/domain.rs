mod device_control_service;
mod device_registration_service;
mod realtime_snapshot_service;

pub use device_control_service::*;
pub use device_registration_service::*;
pub use realtime_snapshot_service::*;
