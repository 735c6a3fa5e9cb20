//! Deadline and cancellation enforcement for asynchronous work

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Fired once when a deadline elapses, before the caller is told
pub type TimeoutCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Why a unit of work did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interruption {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Wraps work with a deadline. Interrupted work is dropped, which cancels it.
#[derive(Debug, Clone)]
pub struct TimeoutManager {
    poll_interval: Duration,
}

impl TimeoutManager {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `work` with a hard deadline
    pub async fn run<F, T>(
        &self,
        limit: Duration,
        work: F,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<T, Interruption>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(limit, work).await {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!("Work exceeded its {:?} deadline", limit);
                fire(on_timeout).await;
                Err(Interruption::TimedOut(limit))
            }
        }
    }

    /// Like [`run`](Self::run), additionally polling `cancel` every poll interval
    pub async fn run_cancellable<F, T>(
        &self,
        limit: Duration,
        work: F,
        cancel: &CancellationToken,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<T, Interruption>
    where
        F: Future<Output = T>,
    {
        if cancel.is_cancelled() {
            return Err(Interruption::Cancelled);
        }

        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);
        tokio::pin!(work);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                value = &mut work => return Ok(value),
                _ = &mut deadline => {
                    tracing::warn!("Work exceeded its {:?} deadline", limit);
                    fire(on_timeout).await;
                    return Err(Interruption::TimedOut(limit));
                }
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        tracing::debug!("Work cancelled by caller");
                        return Err(Interruption::Cancelled);
                    }
                }
            }
        }
    }
}

impl Default for TimeoutManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn fire(callback: Option<TimeoutCallback>) {
    if let Some(callback) = callback {
        callback().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = TimeoutManager::new()
            .run(Duration::from_secs(1), async { 7 }, None)
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_timeout_fires_callback() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let callback: TimeoutCallback = Box::new(move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });

        let result = TimeoutManager::new()
            .run(
                Duration::from_millis(20),
                tokio::time::sleep(Duration::from_secs(5)),
                Some(callback),
            )
            .await;

        assert_eq!(result, Err(Interruption::TimedOut(Duration::from_millis(20))));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_is_observed() {
        let token = CancellationToken::new();
        let remote = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            remote.cancel();
        });

        let started = std::time::Instant::now();
        let result = TimeoutManager::new()
            .with_poll_interval(Duration::from_millis(10))
            .run_cancellable(
                Duration::from_secs(5),
                tokio::time::sleep(Duration::from_secs(5)),
                &token,
                None,
            )
            .await;

        assert_eq!(result, Err(Interruption::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_work() {
        let token = CancellationToken::new();
        token.cancel();
        let result = TimeoutManager::new()
            .run_cancellable(Duration::from_secs(1), async { 1 }, &token, None)
            .await;
        assert_eq!(result, Err(Interruption::Cancelled));
    }

    #[tokio::test]
    async fn test_cancellable_deadline() {
        let result = TimeoutManager::new()
            .run_cancellable(
                Duration::from_millis(20),
                tokio::time::sleep(Duration::from_secs(5)),
                &CancellationToken::new(),
                None,
            )
            .await;
        assert!(matches!(result, Err(Interruption::TimedOut(_))));
    }
}
