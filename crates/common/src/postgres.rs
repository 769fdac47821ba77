mod client;
mod config;
mod customer_repository;
mod device_repository;
mod migrations;
mod snapshot_repository;
mod telemetry_store;
mod zone_repository;

pub use client::*;
pub use config::*;
pub use customer_repository::*;
pub use device_repository::*;
pub use migrations::*;
pub use snapshot_repository::*;
pub use telemetry_store::*;
pub use zone_repository::*;
