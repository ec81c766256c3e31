use crate::core::ports::event_stream::EventStreamPort;
use crate::utils::error::{RelayError, RelayResult};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default bound for each topic management call against the stream platform.
pub const TOPIC_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves a topic name to its identifier, creating the topic when allowed.
///
/// * Existing topic: its identifier is returned and nothing is changed.
/// * Missing topic and `create` set: the topic is created and the new identifier returned.
/// * Missing topic and `create` unset: `TopicNotFound`.
///
/// Every platform call is bounded by `call_timeout`.
pub async fn resolve_topic(
    stream: &dyn EventStreamPort,
    name: &str,
    create: bool,
    call_timeout: Duration,
) -> RelayResult<String> {
    let exists = timeout(call_timeout, stream.topic_exists(name)).await??;
    debug!(topic = name, exists, "topic exists check");

    if exists {
        return timeout(call_timeout, stream.topic_id(name)).await?;
    }

    if !create {
        return Err(RelayError::TopicNotFound(name.to_string()));
    }

    let topic_id = timeout(call_timeout, stream.create_topic(name)).await??;
    info!(topic = name, topic_id = %topic_id, "topic created");
    Ok(topic_id)
}
