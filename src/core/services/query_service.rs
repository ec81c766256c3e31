use crate::core::domain::alert::AlertEvent;
use crate::core::ports::event_stream::{EventStreamPort, QueryCursor};
use crate::utils::error::{RelayError, RelayResult};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Upper bound for opening a query cursor.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(20);

/// Queries the alerts stored on a topic, oldest first.
///
/// Skips the first `offset` events and reads at most `limit`.
pub async fn query_alerts(
    stream: &dyn EventStreamPort,
    topic_id: &str,
    offset: usize,
    limit: usize,
) -> RelayResult<AlertIterator> {
    let cursor = timeout(QUERY_TIMEOUT, stream.query(topic_id, offset, limit)).await??;
    Ok(AlertIterator::new(cursor))
}

/// Reads undecoded alerts off a query cursor.
///
/// Iteration stops at the end of the result or at the first cursor error. The error is kept
/// and reported by [`AlertIterator::error`] and [`AlertIterator::release`] once reading is done.
pub struct AlertIterator {
    cursor: Box<dyn QueryCursor>,
    error: Option<RelayError>,
    done: bool,
}

impl AlertIterator {
    pub fn new(cursor: Box<dyn QueryCursor>) -> Self {
        Self {
            cursor,
            error: None,
            done: false,
        }
    }

    /// The next alert, rebuilt from the stored event's metadata and payload.
    pub async fn next_alert(&mut self) -> Option<AlertEvent> {
        if self.done {
            return None;
        }

        match self.cursor.fetch_one().await {
            Ok(Some(event)) => Some(AlertEvent::from_event(&event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.error = Some(e);
                self.done = true;
                None
            }
        }
    }

    /// The error that ended iteration early, if any.
    pub fn error(&self) -> Option<&RelayError> {
        self.error.as_ref()
    }

    /// Closes the cursor.
    ///
    /// Returns the iteration error if there was one, otherwise the result of closing.
    pub async fn release(mut self) -> RelayResult<()> {
        let closed = self.cursor.close().await;
        match self.error.take() {
            Some(e) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "could not close query cursor");
                }
                Err(e)
            }
            None => closed,
        }
    }
}
