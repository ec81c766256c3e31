use crate::config::ConnectionOption;
use crate::core::ports::event_stream::{
    Acknowledger, EventStreamPort, InboundEvent, NackCode, ProjectInfo, QueryCursor, TopicInfo,
};
use crate::messaging::Event;
use crate::utils::error::{RelayError, RelayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Default buffer of every subscription channel.
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 100;

/// How an event delivered to a subscription was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Nacked(NackCode),
}

/// One entry of the broker's settlement ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub topic_id: String,
    /// Position of the event in its topic, starting at 1.
    pub sequence: u64,
    pub outcome: Outcome,
}

struct Subscription {
    connection: Uuid,
    sender: mpsc::Sender<InboundEvent>,
}

struct TopicState {
    id: String,
    created: DateTime<Utc>,
    /// Every event published to the topic, oldest first.
    events: Vec<Event>,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
struct BrokerState {
    /// Topics by name.
    topics: HashMap<String, TopicState>,
    /// Topic names by id.
    names: HashMap<String, String>,
}

/// An in-process event-stream platform.
///
/// Topics are keyed by name and get a generated id on creation. Published events fan out to
/// every subscription open at that moment and are kept on the topic, where queries read them;
/// subscriptions opened later only see later events. Acks and nacks are recorded in a ledger
/// that can be inspected with [`MemoryBroker::settlements`].
///
/// The broker is cheap to clone; clones share the same topics and ledger.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<RwLock<BrokerState>>,
    ledger: Arc<RwLock<Vec<Settlement>>>,
    subscription_capacity: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIPTION_CAPACITY)
    }
}

impl MemoryBroker {
    pub fn new(subscription_capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState::default())),
            ledger: Arc::new(RwLock::new(Vec::new())),
            subscription_capacity: subscription_capacity.max(1),
        }
    }

    /// Opens a connection, checking the credentials among `options`.
    pub fn connect(&self, options: &[ConnectionOption]) -> RelayResult<MemoryStreamAdapter> {
        let mut authenticated = false;
        for option in options {
            match option {
                ConnectionOption::Credentials {
                    client_id,
                    client_secret,
                } => {
                    authenticated = !client_id.is_empty() && !client_secret.is_empty();
                }
                ConnectionOption::Endpoint(endpoint) => {
                    debug!(endpoint = %endpoint, "endpoint ignored by the in-process stream");
                }
                ConnectionOption::AuthUrl(auth_url) => {
                    debug!(auth_url = %auth_url, "auth url ignored by the in-process stream");
                }
            }
        }

        if !authenticated {
            return Err(RelayError::StreamError(
                "client id and secret are required to connect".to_string(),
            ));
        }

        Ok(MemoryStreamAdapter {
            id: Uuid::new_v4(),
            broker: self.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// A snapshot of every ack and nack received so far, in the order they arrived.
    pub async fn settlements(&self) -> Vec<Settlement> {
        self.ledger.read().await.clone()
    }

    /// Number of events published to the named topic, or `None` if it does not exist.
    pub async fn published(&self, name: &str) -> Option<u64> {
        self.state
            .read()
            .await
            .topics
            .get(name)
            .map(|t| t.events.len() as u64)
    }

    async fn record(&self, settlement: Settlement) {
        self.ledger.write().await.push(settlement);
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    topic_id: String,
    sequence: u64,
}

impl MemoryAcker {
    async fn settle(&self, outcome: Outcome) -> RelayResult<()> {
        self.broker
            .record(Settlement {
                topic_id: self.topic_id.clone(),
                sequence: self.sequence,
                outcome,
            })
            .await;
        Ok(())
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> RelayResult<()> {
        self.settle(Outcome::Acked).await
    }

    async fn nack(&self, code: NackCode) -> RelayResult<()> {
        self.settle(Outcome::Nacked(code)).await
    }
}

/// One connection to a [`MemoryBroker`].
///
/// Closing the connection ends the subscriptions it opened and rejects every later call.
pub struct MemoryStreamAdapter {
    id: Uuid,
    broker: MemoryBroker,
    closed: AtomicBool,
}

impl MemoryStreamAdapter {
    fn ensure_open(&self) -> RelayResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::StreamError("connection is closed".to_string()));
        }
        Ok(())
    }
}

fn unknown_topic(topic_id: &str) -> RelayError {
    RelayError::StreamError(format!("unknown topic id {topic_id:?}"))
}

#[async_trait]
impl EventStreamPort for MemoryStreamAdapter {
    async fn topic_exists(&self, name: &str) -> RelayResult<bool> {
        self.ensure_open()?;
        Ok(self.broker.state.read().await.topics.contains_key(name))
    }

    async fn topic_id(&self, name: &str) -> RelayResult<String> {
        self.ensure_open()?;
        self.broker
            .state
            .read()
            .await
            .topics
            .get(name)
            .map(|topic| topic.id.clone())
            .ok_or_else(|| RelayError::TopicNotFound(name.to_string()))
    }

    async fn create_topic(&self, name: &str) -> RelayResult<String> {
        self.ensure_open()?;
        let mut state = self.broker.state.write().await;
        if state.topics.contains_key(name) {
            return Err(RelayError::StreamError(format!(
                "topic {name:?} already exists"
            )));
        }

        let id = Uuid::new_v4().to_string();
        state.names.insert(id.clone(), name.to_string());
        state.topics.insert(
            name.to_string(),
            TopicState {
                id: id.clone(),
                created: Utc::now(),
                events: Vec::new(),
                subscriptions: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn publish(&self, topic_id: &str, event: Event) -> RelayResult<()> {
        self.ensure_open()?;

        let (sequence, senders) = {
            let mut state = self.broker.state.write().await;
            let name = state
                .names
                .get(topic_id)
                .cloned()
                .ok_or_else(|| unknown_topic(topic_id))?;
            let topic = state
                .topics
                .get_mut(&name)
                .ok_or_else(|| unknown_topic(topic_id))?;

            topic.events.push(event.clone());
            topic.subscriptions.retain(|s| !s.sender.is_closed());
            let senders: Vec<_> = topic
                .subscriptions
                .iter()
                .map(|s| s.sender.clone())
                .collect();
            (topic.events.len() as u64, senders)
        };

        for sender in senders {
            let inbound = InboundEvent::new(
                event.clone(),
                Box::new(MemoryAcker {
                    broker: self.broker.clone(),
                    topic_id: topic_id.to_string(),
                    sequence,
                }),
            );
            // A subscription released in the meantime simply misses the event.
            if sender.send(inbound).await.is_err() {
                debug!(topic_id, sequence, "subscription gone, event not delivered");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic_id: &str) -> RelayResult<mpsc::Receiver<InboundEvent>> {
        self.ensure_open()?;

        let mut state = self.broker.state.write().await;
        let name = state
            .names
            .get(topic_id)
            .cloned()
            .ok_or_else(|| unknown_topic(topic_id))?;
        let topic = state
            .topics
            .get_mut(&name)
            .ok_or_else(|| unknown_topic(topic_id))?;

        let (sender, receiver) = mpsc::channel(self.broker.subscription_capacity);
        topic.subscriptions.push(Subscription {
            connection: self.id,
            sender,
        });
        debug!(topic = %name, created = %topic.created, "subscription opened");
        Ok(receiver)
    }

    async fn query(
        &self,
        topic_id: &str,
        offset: usize,
        limit: usize,
    ) -> RelayResult<Box<dyn QueryCursor>> {
        self.ensure_open()?;

        let state = self.broker.state.read().await;
        let topic = state
            .names
            .get(topic_id)
            .and_then(|name| state.topics.get(name))
            .ok_or_else(|| unknown_topic(topic_id))?;

        let rows = topic
            .events
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(Box::new(MemoryCursor { rows, closed: false }))
    }

    async fn info(&self) -> RelayResult<ProjectInfo> {
        self.ensure_open()?;

        let state = self.broker.state.read().await;
        let mut topics: Vec<TopicInfo> = state
            .topics
            .iter()
            .map(|(name, topic)| TopicInfo {
                topic_id: topic.id.clone(),
                name: name.clone(),
                events: topic.events.len() as u64,
            })
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ProjectInfo {
            num_topics: topics.len() as u64,
            events: topics.iter().map(|t| t.events).sum(),
            topics,
        })
    }

    async fn close(&self) -> RelayResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(RelayError::StreamError(
                "connection already closed".to_string(),
            ));
        }

        let mut state = self.broker.state.write().await;
        for topic in state.topics.values_mut() {
            topic.subscriptions.retain(|s| s.connection != self.id);
        }
        info!(connection = %self.id, "stream connection closed");
        Ok(())
    }
}

/// Cursor over a snapshot of a topic's events taken when the query ran.
struct MemoryCursor {
    rows: VecDeque<Event>,
    closed: bool,
}

#[async_trait]
impl QueryCursor for MemoryCursor {
    async fn fetch_one(&mut self) -> RelayResult<Option<Event>> {
        if self.closed {
            return Err(RelayError::StreamError("cursor is closed".to_string()));
        }
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::StreamError("cursor already closed".to_string()));
        }
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}
