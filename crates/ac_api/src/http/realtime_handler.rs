use async_trait::async_trait;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use common::domain::{CustomerPrincipal, DenialReason, DomainError, DomainResult};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::http::{
    run_broadcast_loop, ApiError, AppState, BroadcastMessage, ConnectionLifecycle, SinkError,
    SnapshotSink,
};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub token: Option<String>,
}

/// `GET /ws/devices/{customer_id}?token=...`
///
/// The token is checked before the handshake; a refused connection never
/// upgrades and gets the usual JSON error response instead.
pub async fn device_feed(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Query(query): Query<FeedQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let customer = match authenticate(&state, &customer_id, query.token.as_deref()).await {
        Ok(customer) => customer,
        Err(e) => {
            warn!(customer_id = %customer_id, error = %e, "websocket upgrade refused");
            return ApiError::from(e).into_response();
        }
    };

    match ws {
        Ok(ws) => {
            debug!(customer_id = %customer.customer_id, "websocket upgrade accepted");
            ws.on_upgrade(move |socket| serve_feed(socket, state, customer))
        }
        Err(rejection) => rejection.into_response(),
    }
}

async fn serve_feed(socket: WebSocket, state: AppState, customer: CustomerPrincipal) {
    info!(customer_id = %customer.customer_id, "websocket connection established");

    let (sender, receiver) = socket.split();
    let lifecycle = Arc::new(ConnectionLifecycle::new());
    let reader = tokio::spawn(watch_client(receiver, Arc::clone(&lifecycle)));
    let mut sink = WsSnapshotSink { sender };

    run_broadcast_loop(
        &state.snapshots,
        customer.customer_id,
        &mut sink,
        &lifecycle,
        state.broadcast_interval,
    )
    .await;

    reader.abort();
}

async fn authenticate(
    state: &AppState,
    raw_customer_id: &str,
    token: Option<&str>,
) -> DomainResult<CustomerPrincipal> {
    let customer_id = Uuid::parse_str(raw_customer_id)
        .map_err(|_| DomainError::InvalidCustomerId(raw_customer_id.to_string()))?;
    let token = token.ok_or(DomainError::Unauthorized(DenialReason::MissingCredentials))?;

    state
        .credential_gate
        .verify_customer_for_path(token, customer_id)
        .await
}

/// Drains client frames so close frames and disconnects are noticed.
async fn watch_client(mut receiver: SplitStream<WebSocket>, lifecycle: Arc<ConnectionLifecycle>) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(frame)) => {
                lifecycle.client_closed(frame.map(|frame| frame.code));
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                lifecycle.transport_lost();
                return;
            }
        }
    }
    lifecycle.transport_lost();
}

struct WsSnapshotSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl SnapshotSink for WsSnapshotSink {
    async fn send(&mut self, message: &BroadcastMessage<'_>) -> Result<(), SinkError> {
        let text = serde_json::to_string(message)?;
        self.sender
            .send(Message::Text(text))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &'static str) -> Result<(), SinkError> {
        let frame = CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        };
        self.sender
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}
