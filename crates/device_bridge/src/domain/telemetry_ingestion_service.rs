use std::sync::Arc;

use common::domain::{DomainResult, RecordOutcome, TelemetryEvent, TelemetryStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

use crate::domain::IngestHandoff;

/// Persists validated device messages.
pub struct TelemetryIngestionService {
    store: Arc<dyn TelemetryStore>,
}

impl TelemetryIngestionService {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Apply one event to the store.
    ///
    /// Flow:
    /// 1. Derive the device update (last seen, firmware from telemetry)
    /// 2. Look up the device, update it and append history in one transaction
    /// 3. Unknown devices are reported, not created
    #[instrument(skip(self, event), fields(device_id = %event.device_id, kind = %event.kind))]
    pub async fn ingest(&self, event: TelemetryEvent) -> DomainResult<RecordOutcome> {
        let customer_id = event.customer_id;
        let outcome = self.store.record_telemetry(event.into_write()).await?;

        match outcome {
            RecordOutcome::Recorded => debug!(customer_id = %customer_id, "telemetry persisted"),
            RecordOutcome::UnknownDevice => {
                warn!(customer_id = %customer_id, "device not registered, message dropped")
            }
        }

        Ok(outcome)
    }
}

/// Single consumer of the ingestion queue.
///
/// Binds the handoff when started, then persists events one at a time until
/// cancelled. A failed event is logged and skipped.
pub async fn run_ingestion_worker(
    handoff: Arc<IngestHandoff>,
    service: Arc<TelemetryIngestionService>,
    capacity: usize,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    let mut rx = handoff.bind(capacity)?;
    info!(capacity, "ingestion worker started");

    loop {
        let event = tokio::select! {
            _ = ctx.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let span = info_span!(
            parent: Span::none(),
            "ingest_telemetry",
            device_id = %event.device_id,
            kind = %event.kind,
        );
        async {
            if let Err(e) = service.ingest(event).await {
                error!(error = %e, "failed to persist telemetry");
            }
        }
        .instrument(span)
        .await;
    }

    info!("ingestion worker stopped");
    Ok(())
}
