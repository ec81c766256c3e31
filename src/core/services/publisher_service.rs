use crate::config::Config;
use crate::core::ports::alert_source::AlertSource;
use crate::core::ports::event_stream::EventStreamPort;
use crate::core::ports::runner::Runner;
use crate::core::services::topic::{resolve_topic, TOPIC_CALL_TIMEOUT};
use crate::utils::error::{RelayError, RelayResult};
use crate::utils::scheduler::schedule_polling;
use crate::utils::signals::cancel_on_shutdown_signal;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Settings the publisher needs from the configuration.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub topic: String,
    pub ensure_topic_exists: bool,
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub topic_timeout: Duration,
}

impl PublisherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.topic.clone(),
            ensure_topic_exists: config.ensure_topic_exists,
            interval: config.interval,
            fetch_timeout: config.fetch_timeout,
            topic_timeout: TOPIC_CALL_TIMEOUT,
        }
    }
}

/// The `AlertPublisher` polls the alert source on a fixed interval and publishes every active
/// alert to the alerts topic.
pub struct AlertPublisher {
    /// Where active alerts are fetched from.
    source: Arc<dyn AlertSource>,
    /// Connection to the event stream, owned and closed by the publisher.
    stream: Arc<dyn EventStreamPort>,
    settings: PublisherSettings,
}

impl AlertPublisher {
    pub fn new(
        source: Arc<dyn AlertSource>,
        stream: Arc<dyn EventStreamPort>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            source,
            stream,
            settings,
        }
    }

    /// Runs the publisher until the process receives a termination signal.
    pub async fn run(self) -> RelayResult<()> {
        let cancel_token = CancellationToken::new();
        let watcher = cancel_on_shutdown_signal(cancel_token.clone());

        let result = self.run_until(cancel_token.clone()).await;

        cancel_token.cancel();
        if let Err(e) = watcher.await {
            warn!("Signal watcher failed: {e}");
        }
        result
    }

    /// Runs the publisher until `cancel_token` is cancelled.
    ///
    /// A zero interval is rejected before anything else. The topic is resolved next; failing
    /// that is fatal. Afterwards every tick fetches the active alerts and publishes them in
    /// order. Fetch and publish failures only abandon the tick they happen in. Once cancelled,
    /// the tick in progress finishes, the stream connection is closed and the result of closing
    /// it is returned.
    pub async fn run_until(self, cancel_token: CancellationToken) -> RelayResult<()> {
        if self.settings.interval.is_zero() {
            return Err(RelayError::ConfigError(
                "interval must be greater than 0".to_string(),
            ));
        }
        let started = Utc::now();

        let topic_id = resolve_topic(
            self.stream.as_ref(),
            &self.settings.topic,
            self.settings.ensure_topic_exists,
            self.settings.topic_timeout,
        )
        .await?;

        info!(
            topic = %self.settings.topic,
            topic_id = %topic_id,
            interval = %humantime::format_duration(self.settings.interval),
            "Publisher started"
        );

        let tick = PublishTick::new(
            self.source.clone(),
            self.stream.clone(),
            topic_id,
            self.settings.fetch_timeout,
        );
        let joined = schedule_polling(self.settings.interval, tick, "AlertPublisher", cancel_token)
            .await;

        let uptime = Utc::now() - started;
        info!(
            uptime_secs = uptime.num_seconds(),
            "Publisher shutting down"
        );

        let closed = self.stream.close().await;
        joined?;
        closed
    }
}

/// One fetch-and-publish batch, executed on every scheduler tick.
pub struct PublishTick {
    source: Arc<dyn AlertSource>,
    stream: Arc<dyn EventStreamPort>,
    topic_id: String,
    fetch_timeout: Duration,
}

impl PublishTick {
    pub fn new(
        source: Arc<dyn AlertSource>,
        stream: Arc<dyn EventStreamPort>,
        topic_id: String,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            stream,
            topic_id,
            fetch_timeout,
        }
    }

    /// Fetches the active alerts and publishes them in source order.
    ///
    /// Publishing stops at the first failure; the remaining alerts of the batch are not
    /// attempted and the error carries how many were published before it.
    ///
    /// # Returns
    ///
    /// The number of alerts published.
    pub async fn publish_batch(&self) -> RelayResult<usize> {
        let fetch = self.source.fetch_active_alerts(self.fetch_timeout);
        let alerts = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| {
                RelayError::FetchError(format!(
                    "no response within {}",
                    humantime::format_duration(self.fetch_timeout)
                ))
            })??;

        let mut published = 0;
        for alert in &alerts {
            if let Err(e) = self.stream.publish(&self.topic_id, alert.to_event()).await {
                return Err(RelayError::PublishError {
                    published,
                    reason: e.to_string(),
                });
            }
            published += 1;
        }

        Ok(published)
    }
}

#[async_trait::async_trait]
impl Runner for PublishTick {
    async fn run(&mut self) -> RelayResult<()> {
        match self.publish_batch().await {
            Ok(count) => {
                info!(count, "weather alerts published");
                Ok(())
            }
            Err(RelayError::PublishError { published, reason }) => {
                warn!(
                    count = published,
                    error = %reason,
                    "weather alerts partially published"
                );
                Err(RelayError::PublishError { published, reason })
            }
            Err(e) => Err(e),
        }
    }
}
