mod ingest_handoff;
mod telemetry_ingestion_service;

pub use ingest_handoff::*;
pub use telemetry_ingestion_service::*;
