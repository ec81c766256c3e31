use crate::core::domain::alert::{alert_type, AlertEvent, ALERT_MIMETYPE};
use crate::core::ports::event_stream::{InboundEvent, NackCode};
use crate::messaging::Event;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters kept by the receive loop.
#[derive(Default, Debug)]
pub struct ListenerStats {
    /// Events acked and handed to the output channel
    accepted: AtomicUsize,
    /// Events nacked during validation
    skipped: AtomicUsize,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the current counters.
    ///
    /// # Returns
    /// A tuple containing:
    /// - Number of accepted events
    /// - Number of skipped events
    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.accepted.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
        )
    }
}

/// Checks an inbound envelope and decodes it into an alert.
///
/// The checks run in a fixed order and stop at the first failure: type name, then mimetype,
/// then JSON decoding. The payload is never decoded for an event failing one of the first two.
pub fn validate(event: &Event) -> Result<AlertEvent, NackCode> {
    if !event.event_type.same_name(&alert_type()) {
        return Err(NackCode::UnknownType);
    }

    if event.mimetype != ALERT_MIMETYPE {
        return Err(NackCode::UnhandledMimetype);
    }

    let mut alert = AlertEvent::from_event(event);
    match alert.parse() {
        Ok(_) => Ok(alert),
        Err(e) => {
            debug!(error = %e, "could not decode alert payload");
            Err(NackCode::Unprocessed)
        }
    }
}

/// Runs the receive loop of a subscription.
///
/// Each inbound event is validated, then acked and forwarded to `alerts`, or nacked with the
/// reason it failed. Ack and nack failures are logged and never change the outcome already
/// decided for the event. Sending to `alerts` waits while the channel is full, so a slow
/// consumer holds back the settling of later events.
///
/// Cancellation is checked before each read: the event being processed when the token fires
/// is settled, and no further event is read. The loop also ends when the subscription closes
/// or the `alerts` receiver is dropped. Both channels are dropped on exit, which releases the
/// subscription and closes the output.
///
/// # Arguments
/// * `inbound` - Events of the subscription, in arrival order
/// * `alerts` - Output channel for accepted alerts
/// * `cancel_token` - Token for graceful shutdown coordination
/// * `stats` - Counters updated as events are settled
pub async fn run_event_listener(
    mut inbound: Receiver<InboundEvent>,
    alerts: Sender<AlertEvent>,
    cancel_token: CancellationToken,
    stats: Arc<ListenerStats>,
) {
    info!("Event listener started");

    loop {
        let event = select! {
            biased;
            _ = cancel_token.cancelled() => {
                info!("Event listener cancelled gracefully");
                break;
            }
            received = inbound.recv() => match received {
                Some(event) => event,
                None => {
                    warn!("Subscription closed by the event stream");
                    break;
                }
            }
        };

        match validate(event.event()) {
            Ok(alert) => {
                if let Err(e) = event.ack().await {
                    warn!(error = %e, "could not ack event");
                }

                if alerts.send(alert).await.is_err() {
                    warn!("Alert receiver dropped, stopping event listener");
                    break;
                }
                stats.accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(code) => {
                stats.skipped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    reason = code.reason(),
                    event_type = %event.event().event_type,
                    mimetype = %event.event().mimetype,
                    "rejecting event"
                );
                if let Err(e) = event.nack(code).await {
                    warn!(error = %e, reason = code.reason(), "could not nack event");
                }
            }
        }
    }

    drop(inbound);
    let (accepted, skipped) = stats.get_stats();
    info!(
        accepted,
        skipped,
        "Event listener shutting down. Accepted {} alerts, skipped {} events",
        accepted,
        skipped
    );
}
