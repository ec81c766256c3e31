use crate::adapters::stream::memory_stream::MemoryBroker;
use crate::adapters::weather::noaa_client::WeatherApiAdapter;
use crate::config::Config;
use crate::core::domain::alert::AlertEvent;
use crate::core::ports::alert_source::AlertSource;
use crate::core::ports::event_stream::{EventStreamPort, ProjectInfo};
use crate::core::services::publisher_service::{AlertPublisher, PublisherSettings};
use crate::core::services::subscriber_service::{AlertSubscriber, SubscriberSettings};
use crate::core::services::topic::{resolve_topic, TOPIC_CALL_TIMEOUT};
use crate::utils::error::RelayResult;
use std::sync::Arc;
use tracing::{info, warn};

pub fn setup_weather_source(config: &Config) -> RelayResult<Arc<dyn AlertSource>> {
    let adapter = WeatherApiAdapter::new(&config.weather.base_url, &config.weather.user_agent)?;
    Ok(Arc::new(adapter))
}

pub fn connect_stream(
    config: &Config,
    broker: &MemoryBroker,
) -> RelayResult<Arc<dyn EventStreamPort>> {
    let connection = broker.connect(&config.ensign.options())?;
    Ok(Arc::new(connection))
}

pub fn setup_publisher(
    config: &Config,
    source: Arc<dyn AlertSource>,
    broker: &MemoryBroker,
) -> RelayResult<AlertPublisher> {
    let stream = connect_stream(config, broker)?;
    Ok(AlertPublisher::new(
        source,
        stream,
        PublisherSettings::from_config(config),
    ))
}

pub fn setup_subscriber(config: &Config, broker: &MemoryBroker) -> RelayResult<AlertSubscriber> {
    let stream = connect_stream(config, broker)?;
    Ok(AlertSubscriber::new(
        stream,
        SubscriberSettings::from_config(config),
    ))
}

/// Creates the configured topic on a short-lived connection if it is missing.
pub async fn prepare_topic(config: &Config, broker: &MemoryBroker) -> RelayResult<String> {
    let admin = connect_stream(config, broker)?;
    let resolved = resolve_topic(admin.as_ref(), &config.topic, true, TOPIC_CALL_TIMEOUT).await;
    admin.close().await?;
    resolved
}

/// Starts an in-process broker for a single-role command and prepares its topic.
///
/// Nothing outside this process can reach the broker, so a publisher started this way has no
/// subscribers and a subscriber has no publishers.
pub async fn private_broker(config: &Config, role: &str) -> RelayResult<MemoryBroker> {
    let broker = MemoryBroker::default();
    let topic_id = prepare_topic(config, &broker).await?;
    warn!(
        role,
        topic = %config.topic,
        topic_id = %topic_id,
        "running on a private in-process event stream with no peers; use `relay` to connect both ends"
    );
    Ok(broker)
}

/// Topic and event counts of the broker, read on a short-lived connection.
pub async fn project_info(config: &Config, broker: &MemoryBroker) -> RelayResult<ProjectInfo> {
    let admin = connect_stream(config, broker)?;
    let info = admin.info().await;
    admin.close().await?;
    info
}

/// Subscriber callback that logs the headline of every alert.
///
/// Alerts without a headline are reported and skipped; they never stop the subscriber.
pub async fn log_headline(alert: AlertEvent) -> anyhow::Result<()> {
    match alert.headline() {
        Ok(headline) => info!(
            correlation_id = %alert.correlation_id,
            expires = %alert.expires,
            "{headline}"
        ),
        Err(e) => warn!(error = %e, "could not get headline from alert"),
    }
    Ok(())
}
