use std::sync::Arc;

use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, Packet, Publish, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Span};

use crate::domain::{HandoffError, IngestHandoff};
use crate::mqtt::{parse_inbound, Backoff, BrokerConfig};

/// Drive the broker session for the life of the process.
///
/// Polls the event loop, hands each inbound publish to the ingestion queue
/// without waiting, and resubscribes on every (re)connect. Connection errors
/// are retried with exponential backoff; this only returns on cancellation.
#[instrument(
    name = "broker_bridge",
    skip_all,
    fields(
        host = %config.host,
        port = config.port,
        client_id = %config.client_id,
    )
)]
pub async fn run_broker_bridge(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: BrokerConfig,
    handoff: Arc<IngestHandoff>,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    let filter = config.subscription_filter();
    let mut subscription = Subscription::new(filter.clone());
    let mut backoff = Backoff::new(config.reconnect_initial_delay, config.reconnect_max_delay);

    info!(filter = %filter, "starting broker bridge");

    loop {
        let event = tokio::select! {
            _ = ctx.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&config.namespace, &publish, &handoff);
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to broker");
                backoff.reset();
                // Clean sessions drop subscriptions, so subscribe on every connect.
                subscription.on_connack();
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                subscription.on_suback();
            }
            Ok(_) => {}
            Err(e) => {
                subscription.on_connection_lost();
                let delay = backoff.next_delay();
                warn!(
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "broker connection lost, reconnecting"
                );
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }
        }

        // The request queue may be full when the ConnAck arrives; each poll
        // drains it, so keep retrying until the subscribe is queued.
        subscription.retry(&client);
    }

    debug!("disconnecting from broker");
    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "disconnect request not queued");
    }
    info!("broker bridge stopped");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionState {
    Disconnected,
    Pending,
    Requested,
    Active,
}

/// Subscription progress for the current broker session.
#[derive(Debug)]
struct Subscription {
    filter: String,
    state: SubscriptionState,
    failed_attempts: u32,
}

impl Subscription {
    fn new(filter: String) -> Self {
        Self {
            filter,
            state: SubscriptionState::Disconnected,
            failed_attempts: 0,
        }
    }

    fn on_connack(&mut self) {
        self.state = SubscriptionState::Pending;
        self.failed_attempts = 0;
    }

    fn on_suback(&mut self) {
        if self.state == SubscriptionState::Requested {
            info!(filter = %self.filter, "subscription acknowledged");
            self.state = SubscriptionState::Active;
        }
    }

    fn on_connection_lost(&mut self) {
        self.state = SubscriptionState::Disconnected;
    }

    /// Queue the subscribe if this session still needs one.
    fn retry(&mut self, client: &AsyncClient) {
        if self.state != SubscriptionState::Pending {
            return;
        }

        match client.try_subscribe(self.filter.as_str(), QoS::AtLeastOnce) {
            Ok(()) => {
                debug!(filter = %self.filter, "subscription queued");
                self.state = SubscriptionState::Requested;
            }
            Err(e) => {
                self.failed_attempts += 1;
                if self.failed_attempts == 1 {
                    warn!(error = %e, filter = %self.filter, "request queue full, subscription deferred");
                } else {
                    debug!(attempt = self.failed_attempts, "subscription still deferred");
                }
            }
        }
    }
}

/// Validate one inbound message and queue it for persistence.
///
/// Runs inline on the broker event loop, so it never awaits. Every failure
/// drops only this message.
pub(crate) fn handle_publish(namespace: &str, publish: &Publish, handoff: &IngestHandoff) {
    let span = info_span!(
        parent: Span::none(),
        "mqtt_message",
        topic = %publish.topic,
        payload_size = publish.payload.len(),
        device_id = tracing::field::Empty,
    );
    let _entered = span.enter();

    let event = match parse_inbound(namespace, &publish.topic, &publish.payload, Utc::now()) {
        Ok(event) => event,
        Err(e) if e.is_outbound_echo() => {
            debug!(error = %e, "ignoring outbound device message");
            return;
        }
        Err(e) => {
            warn!(error = %e, "invalid device message, dropping");
            return;
        }
    };

    Span::current().record("device_id", event.device_id.as_str());

    match handoff.submit(event) {
        Ok(()) => debug!("queued for ingestion"),
        Err(HandoffError::NotReady) => {
            warn!("ingestion worker not ready, dropping message")
        }
        Err(e) => warn!(error = %e, "ingestion handoff refused, dropping message"),
    }
}
