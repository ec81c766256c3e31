use thiserror::Error;

/// Represents errors that can occur in the relay.
///
/// The `RelayError` enum covers configuration problems, topic resolution, calls into the
/// event-stream platform, fetching alerts from the weather feed, publishing, decoding alert
/// payloads, callback failures and task join errors.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("topic {0:?} does not exist")]
    TopicNotFound(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    /// Publishing stopped part way through a batch.
    #[error("Publish error after {published} alerts: {reason}")]
    PublishError { published: usize, reason: String },

    #[error("Decode error: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("missing properties")]
    MissingProperties,

    #[error("missing headline")]
    MissingHeadline,

    #[error("Callback error: {0}")]
    CallbackError(anyhow::Error),

    #[error("Join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::FetchError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for RelayError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        RelayError::StreamError(format!("deadline exceeded: {err}"))
    }
}
