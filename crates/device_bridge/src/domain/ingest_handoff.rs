use std::sync::OnceLock;

use common::domain::TelemetryEvent;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffError {
    #[error("ingestion worker not started yet")]
    NotReady,

    #[error("ingestion queue is full")]
    Full,

    #[error("ingestion worker has stopped")]
    Closed,

    #[error("ingestion worker already bound")]
    AlreadyBound,
}

/// Non-blocking handoff from the broker event loop to the ingestion worker.
///
/// The sending half is installed exactly once, when the worker starts
/// consuming. Until then every submission is refused so the broker loop never
/// waits on the worker.
#[derive(Debug, Default)]
pub struct IngestHandoff {
    sender: OnceLock<mpsc::Sender<TelemetryEvent>>,
}

impl IngestHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bounded queue and install its sender. Only the first call
    /// succeeds.
    pub fn bind(&self, capacity: usize) -> Result<mpsc::Receiver<TelemetryEvent>, HandoffError> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.sender.set(tx).map_err(|_| HandoffError::AlreadyBound)?;
        Ok(rx)
    }

    pub fn is_bound(&self) -> bool {
        self.sender.get().is_some()
    }

    /// Queue an event without waiting.
    pub fn submit(&self, event: TelemetryEvent) -> Result<(), HandoffError> {
        let sender = self.sender.get().ok_or(HandoffError::NotReady)?;
        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => HandoffError::Full,
            TrySendError::Closed(_) => HandoffError::Closed,
        })
    }
}
