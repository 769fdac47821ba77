mod device_bridge;
pub mod domain;
pub mod mqtt;

pub use device_bridge::*;
