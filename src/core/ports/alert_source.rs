use crate::core::domain::alert::AlertEvent;
use crate::utils::error::RelayResult;
use async_trait::async_trait;
use std::time::Duration;

/// A trait defining where active weather alerts come from.
///
/// Implementations return one undecoded [`AlertEvent`] per active alert, in the order the feed
/// lists them, with the provenance of the fetch copied onto each alert.
///
/// The trait is marked with `#[cfg_attr(feature = "test-helpers", mockall::automock)]`
/// so that when the `test-helpers` feature is enabled, a mock implementation is automatically generated.
#[cfg_attr(feature = "test-helpers", mockall::automock)]
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Fetches the currently active alerts.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound for the whole fetch.
    ///
    /// # Returns
    ///
    /// The active alerts, or a `FetchError` on transport failure, a non-2xx status or an
    /// unexpected content type.
    async fn fetch_active_alerts(&self, timeout: Duration) -> RelayResult<Vec<AlertEvent>>;
}
