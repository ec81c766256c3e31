use crate::messaging::Event;
use crate::utils::error::RelayResult;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

/// Why an inbound event was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackCode {
    /// The event's type name is not the alert type.
    UnknownType,
    /// The payload encoding is not the one alerts are published with.
    UnhandledMimetype,
    /// The payload could not be decoded.
    Unprocessed,
}

impl NackCode {
    pub fn reason(&self) -> &'static str {
        match self {
            NackCode::UnknownType => "unknown type",
            NackCode::UnhandledMimetype => "unhandled mimetype",
            NackCode::Unprocessed => "unprocessed",
        }
    }
}

impl fmt::Display for NackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Transport-side handle used to settle one inbound event.
#[cfg_attr(feature = "test-helpers", mockall::automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Tells the platform the event was processed.
    async fn ack(&self) -> RelayResult<()>;

    /// Tells the platform the event was rejected, with a reason.
    async fn nack(&self, code: NackCode) -> RelayResult<()>;
}

/// An event received from a subscription, waiting to be acked or nacked.
///
/// Both `ack` and `nack` consume the value, so an event is settled at most once; dropping it
/// unsettled is the only other way out.
pub struct InboundEvent {
    event: Event,
    acker: Box<dyn Acknowledger>,
}

impl InboundEvent {
    pub fn new(event: Event, acker: Box<dyn Acknowledger>) -> Self {
        Self { event, acker }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub async fn ack(self) -> RelayResult<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, code: NackCode) -> RelayResult<()> {
        self.acker.nack(code).await
    }
}

impl fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundEvent")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Server-side cursor over the result of a query, read one event at a time.
#[cfg_attr(feature = "test-helpers", mockall::automock)]
#[async_trait]
pub trait QueryCursor: Send {
    /// The next event of the result, or `None` once every row has been read.
    async fn fetch_one(&mut self) -> RelayResult<Option<Event>>;

    /// Releases the cursor. Later fetches fail.
    async fn close(&mut self) -> RelayResult<()>;
}

/// Event count of one topic, as reported by [`EventStreamPort::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicInfo {
    pub topic_id: String,
    pub name: String,
    pub events: u64,
}

/// Usage statistics of the project the connection belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub num_topics: u64,
    pub events: u64,
    pub topics: Vec<TopicInfo>,
}

/// A trait defining the event-stream operations required by the relay.
///
/// This trait abstracts the platform the alerts are published to and consumed from: topic
/// management, publishing, subscribing, querying stored events and closing the connection. A connection is owned by a
/// single publisher or subscriber and closed once by that owner.
///
/// The trait is annotated with `#[cfg_attr(feature = "test-helpers", mockall::automock)]`
/// to allow automatic generation of mock implementations for testing purposes.
#[cfg_attr(feature = "test-helpers", mockall::automock)]
#[async_trait]
pub trait EventStreamPort: Send + Sync {
    /// Checks whether a topic with the given name exists.
    async fn topic_exists(&self, name: &str) -> RelayResult<bool>;

    /// Looks up the identifier of an existing topic.
    async fn topic_id(&self, name: &str) -> RelayResult<String>;

    /// Creates a topic and returns its identifier.
    async fn create_topic(&self, name: &str) -> RelayResult<String>;

    /// Publishes one event to the topic. Failures are reported synchronously.
    async fn publish(&self, topic_id: &str, event: Event) -> RelayResult<()>;

    /// Opens a subscription on the topic.
    ///
    /// # Returns
    ///
    /// A channel yielding inbound events in arrival order. Dropping the receiver releases the
    /// subscription.
    async fn subscribe(&self, topic_id: &str) -> RelayResult<mpsc::Receiver<InboundEvent>>;

    /// Opens a cursor over the events stored on the topic, oldest first.
    ///
    /// The first `offset` events are skipped and at most `limit` events are returned.
    async fn query(
        &self,
        topic_id: &str,
        offset: usize,
        limit: usize,
    ) -> RelayResult<Box<dyn QueryCursor>>;

    /// Topic and event counts of the project.
    async fn info(&self) -> RelayResult<ProjectInfo>;

    /// Closes the connection to the platform.
    async fn close(&self) -> RelayResult<()>;
}
