use crate::utils::error::RelayResult;
use async_trait::async_trait;

/// A unit of work executed once per scheduler tick.
///
/// Implementors hold whatever state the work needs between ticks. The scheduler awaits
/// `run()` to completion before it waits for the next tick, so two runs of the same runner
/// never overlap.
///
/// The trait is marked with `#[cfg_attr(feature = "test-helpers", mockall::automock)]` so that,
/// when enabled, a mock implementation is automatically generated for testing purposes.
#[cfg_attr(feature = "test-helpers", mockall::automock)]
#[async_trait]
pub trait Runner: Send + Sync {
    /// Runs one tick of work.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the tick completed.
    /// * An error describing why the tick was abandoned. The scheduler logs it and carries on.
    async fn run(&mut self) -> RelayResult<()>;
}
