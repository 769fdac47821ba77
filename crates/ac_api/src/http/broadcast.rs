//! Per-connection real-time feed.
//!
//! Every tick the loop pushes the customer's device list and, when the
//! customer has devices, the most recent history across them. The device
//! snapshot is always pushed before the history snapshot of the same tick.
//! The loop only stops when the connection ends or an iteration fails.

use async_trait::async_trait;
use common::domain::{Device, DomainError, StatusHistoryRecord};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::RealtimeSnapshotService;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_NO_STATUS: u16 = 1005;
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Wire format: `{"type": "device_update" | "status_history", "data": [...]}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BroadcastMessage<'a> {
    DeviceUpdate(&'a [Device]),
    StatusHistory(&'a [StatusHistoryRecord]),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound half of a client connection.
#[async_trait]
pub trait SnapshotSink: Send {
    async fn send(&mut self, message: &BroadcastMessage<'_>) -> Result<(), SinkError>;

    async fn close(&mut self, code: u16, reason: &'static str) -> Result<(), SinkError>;
}

/// How the client side of a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// Close frame received, with its status code if one was sent.
    ClientClosed(Option<u16>),
    /// Stream ended or failed without a close handshake.
    TransportLost,
}

/// Records the first way a connection ended and wakes the broadcast loop.
#[derive(Debug, Default)]
pub struct ConnectionLifecycle {
    ended: OnceLock<ConnectionEnd>,
    token: CancellationToken,
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_closed(&self, code: Option<u16>) {
        self.end(ConnectionEnd::ClientClosed(code));
    }

    pub fn transport_lost(&self) {
        self.end(ConnectionEnd::TransportLost);
    }

    pub fn ended(&self) -> Option<ConnectionEnd> {
        self.ended.get().copied()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    fn end(&self, end: ConnectionEnd) {
        // first signal wins
        let _ = self.ended.set(end);
        self.token.cancel();
    }
}

/// Why the broadcast loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    ClientClosed(u16),
    TransportLost,
    Failed,
}

impl LoopExit {
    fn from_connection(lifecycle: &ConnectionLifecycle) -> Self {
        match lifecycle.ended() {
            Some(ConnectionEnd::ClientClosed(code)) => {
                LoopExit::ClientClosed(code.unwrap_or(CLOSE_NO_STATUS))
            }
            Some(ConnectionEnd::TransportLost) | None => LoopExit::TransportLost,
        }
    }
}

#[derive(Error, Debug)]
enum IterationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub async fn run_broadcast_loop<S>(
    service: &RealtimeSnapshotService,
    customer_id: Uuid,
    sink: &mut S,
    lifecycle: &ConnectionLifecycle,
    interval: Duration,
) -> LoopExit
where
    S: SnapshotSink + ?Sized,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break LoopExit::from_connection(lifecycle),
            _ = ticker.tick() => {}
        }

        match push_snapshots(service, customer_id, sink).await {
            Ok(()) => {}
            Err(IterationError::Sink(SinkError::Closed | SinkError::Transport(_))) => {
                break LoopExit::from_connection(lifecycle)
            }
            Err(e) => {
                error!(customer_id = %customer_id, error = %e, "broadcast iteration failed");
                if let Err(close_error) = sink
                    .close(CLOSE_INTERNAL_ERROR, "Server processing error")
                    .await
                {
                    debug!(error = %close_error, "close after failure not delivered");
                }
                break LoopExit::Failed;
            }
        }
    };

    log_exit(customer_id, exit);
    exit
}

async fn push_snapshots<S>(
    service: &RealtimeSnapshotService,
    customer_id: Uuid,
    sink: &mut S,
) -> Result<(), IterationError>
where
    S: SnapshotSink + ?Sized,
{
    let snapshot = service.snapshot(customer_id).await?;
    sink.send(&BroadcastMessage::DeviceUpdate(&snapshot.devices)).await?;

    if !snapshot.devices.is_empty() {
        sink.send(&BroadcastMessage::StatusHistory(&snapshot.history)).await?;
    }

    Ok(())
}

fn log_exit(customer_id: Uuid, exit: LoopExit) {
    match exit {
        LoopExit::ClientClosed(code @ (CLOSE_NORMAL | CLOSE_GOING_AWAY | CLOSE_NO_STATUS)) => {
            debug!(customer_id = %customer_id, code, "client closed connection")
        }
        LoopExit::ClientClosed(code) => {
            info!(customer_id = %customer_id, code, "client closed connection with unusual code")
        }
        LoopExit::TransportLost => {
            info!(customer_id = %customer_id, "connection lost without close handshake")
        }
        LoopExit::Failed => {}
    }
}
