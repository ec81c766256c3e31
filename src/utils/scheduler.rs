use crate::core::ports::runner::Runner;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Schedules a periodic polling task.
///
/// This function spawns an asynchronous task that executes the provided `runner`'s `run()` method
/// once per `polling_interval`. The first tick fires one full interval after scheduling. Ticks
/// missed while a slow run was in progress are skipped rather than replayed, so at most one run
/// happens per elapsed interval and runs never overlap.
///
/// Errors returned by a run are logged and the loop carries on. Cancellation is checked whenever
/// the loop is idle; a run already in progress is allowed to finish before the task stops.
///
/// # Arguments
///
/// * `polling_interval` - The period between consecutive ticks. Must be non-zero.
/// * `runner` - An instance implementing the `Runner` trait whose `run()` method will be called on each tick.
/// * `name` - A static string identifier used for logging purposes.
/// * `cancel_token` - A `CancellationToken` to allow graceful cancellation of the polling loop.
///
/// # Returns
///
/// Returns a `JoinHandle<()>` representing the spawned task.
pub fn schedule_polling(
    polling_interval: Duration,
    mut runner: impl Runner + 'static,
    name: &'static str,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + polling_interval, polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    ticks += 1;
                    debug!(tick = ticks, "{name} tick");
                    if let Err(e) = runner.run().await {
                        error!("{name} encountered an error: {e}");
                    }
                }
            }
        }

        info!(ticks, "{name} stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{RelayError, RelayResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingRunner {
        runs: Arc<AtomicUsize>,
        work: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Runner for CountingRunner {
        async fn run(&mut self) -> RelayResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            if self.fail {
                return Err(RelayError::FetchError("feed unavailable".into()));
            }
            Ok(())
        }
    }

    fn runner(work: Duration, fail: bool) -> (CountingRunner, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            CountingRunner {
                runs: runs.clone(),
                work,
                fail,
            },
            runs,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let (runner, runs) = runner(Duration::ZERO, false);
        let cancel_token = CancellationToken::new();
        let handle = schedule_polling(Duration::from_secs(60), runner, "test", cancel_token.clone());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_interval_and_survives_errors() {
        let (runner, runs) = runner(Duration::ZERO, true);
        let cancel_token = CancellationToken::new();
        let handle = schedule_polling(Duration::from_secs(10), runner, "test", cancel_token.clone());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_run_skips_missed_ticks() {
        // Each run takes two and a half intervals. Runs start at 10s, 35s and 60s; the ticks at
        // 20s, 30s, 40s and 50s are never replayed.
        let (runner, runs) = runner(Duration::from_secs(25), false);
        let cancel_token = CancellationToken::new();
        let handle = schedule_polling(Duration::from_secs(10), runner, "test", cancel_token.clone());

        tokio::time::sleep(Duration::from_secs(34)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(23)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_lets_current_run_finish() {
        let (runner, runs) = runner(Duration::from_secs(5), false);
        let cancel_token = CancellationToken::new();
        let handle = schedule_polling(Duration::from_secs(10), runner, "test", cancel_token.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        cancel_token.cancel();

        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
