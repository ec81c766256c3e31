use crate::config::Config;
use crate::core::domain::alert::AlertEvent;
use crate::core::ports::event_stream::EventStreamPort;
use crate::core::services::topic::{resolve_topic, TOPIC_CALL_TIMEOUT};
use crate::messaging::event_listener::{run_event_listener, ListenerStats};
use crate::utils::error::{RelayError, RelayResult};
use crate::utils::signals::cancel_on_shutdown_signal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Capacity of the channel between the receive loop and the alert consumer.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 100;

/// Settings the subscriber needs from the configuration.
#[derive(Debug, Clone)]
pub struct SubscriberSettings {
    pub topic: String,
    pub ensure_topic_exists: bool,
    pub topic_timeout: Duration,
    pub output_capacity: usize,
}

impl SubscriberSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.topic.clone(),
            ensure_topic_exists: config.ensure_topic_exists,
            topic_timeout: TOPIC_CALL_TIMEOUT,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

/// Consumes the alerts topic, validating every inbound event and delivering decoded alerts.
pub struct AlertSubscriber {
    /// Connection to the event stream, owned and closed by the subscriber.
    stream: Arc<dyn EventStreamPort>,
    settings: SubscriberSettings,
    stats: Arc<ListenerStats>,
}

impl AlertSubscriber {
    pub fn new(stream: Arc<dyn EventStreamPort>, settings: SubscriberSettings) -> Self {
        Self {
            stream,
            settings,
            stats: Arc::new(ListenerStats::new()),
        }
    }

    /// Counters of the receive loop: accepted and skipped events.
    pub fn stats(&self) -> Arc<ListenerStats> {
        self.stats.clone()
    }

    /// Subscribes to the topic and spawns the receive loop.
    ///
    /// # Returns
    ///
    /// The bounded channel accepted alerts are delivered on. It closes once the receive loop
    /// has exited, after cancellation or when the subscription ends.
    pub async fn listen(
        &self,
        cancel_token: CancellationToken,
    ) -> RelayResult<mpsc::Receiver<AlertEvent>> {
        let topic_id = resolve_topic(
            self.stream.as_ref(),
            &self.settings.topic,
            self.settings.ensure_topic_exists,
            self.settings.topic_timeout,
        )
        .await?;

        let inbound = self.stream.subscribe(&topic_id).await?;
        let (alerts_tx, alerts_rx) = mpsc::channel(self.settings.output_capacity);

        info!(
            topic = %self.settings.topic,
            topic_id = %topic_id,
            "Subscribed to alerts"
        );

        tokio::spawn(run_event_listener(
            inbound,
            alerts_tx,
            cancel_token,
            self.stats.clone(),
        ));

        Ok(alerts_rx)
    }

    /// Delivers alerts to `callback` until the process receives a termination signal.
    pub async fn run<F, Fut>(self, callback: F) -> RelayResult<()>
    where
        F: FnMut(AlertEvent) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let cancel_token = CancellationToken::new();
        let watcher = cancel_on_shutdown_signal(cancel_token.clone());

        let result = self.run_until(callback, cancel_token.clone()).await;

        cancel_token.cancel();
        if let Err(e) = watcher.await {
            warn!("Signal watcher failed: {e}");
        }
        result
    }

    /// Delivers alerts to `callback` until `cancel_token` is cancelled.
    ///
    /// Alerts are handed over one at a time; the next alert is not delivered before the
    /// callback for the previous one has finished. A callback error cancels the receive loop and
    /// becomes the result. Otherwise the result is that of closing the stream connection once
    /// the loop has exited.
    pub async fn run_until<F, Fut>(
        self,
        mut callback: F,
        cancel_token: CancellationToken,
    ) -> RelayResult<()>
    where
        F: FnMut(AlertEvent) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut alerts = self.listen(cancel_token.clone()).await?;
        let mut outcome = Ok(());

        while let Some(alert) = alerts.recv().await {
            if let Err(e) = callback(alert).await {
                error!(error = %e, "Alert callback failed, stopping subscriber");
                cancel_token.cancel();
                outcome = Err(RelayError::CallbackError(e));
                break;
            }
        }

        // Wait for the receive loop to exit; alerts it still forwards are dropped.
        let mut discarded = 0usize;
        while alerts.recv().await.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "Alerts dropped after the callback failed");
        }

        let closed = self.stream.close().await;
        outcome.and(closed)
    }
}
