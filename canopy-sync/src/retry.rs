//! Bounded retry with jitter.

use crate::error::{SyncError, SyncResult};
use rand::Rng;
use std::future::Future;
use std::ops::Range;
use std::time::Duration;
use tracing::debug;

/// A bounded-retry policy: maximum attempts, a backoff range sampled
/// uniformly per retry, and a predicate selecting which errors are worth
/// retrying. The random jitter de-correlates concurrent retries across
/// clients hitting the same contended resource.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Range<Duration>,
    pub retryable: fn(&SyncError) -> bool,
}

impl Default for RetryPolicy {
    /// Three attempts total, 50–200 ms jitter, contention errors only.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50)..Duration::from_millis(200),
            retryable: SyncError::is_contention,
        }
    }
}

impl RetryPolicy {
    /// Runs `op`, retrying retryable failures up to `max_attempts` total
    /// with a fresh jittered sleep between attempts. Non-retryable errors
    /// and the final failure propagate unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if (self.retryable)(&e) && attempt < self.max_attempts => {
                    let delay = self.jitter();
                    debug!(
                        attempt,
                        max = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn jitter(&self) -> Duration {
        if self.backoff.is_empty() {
            return self.backoff.start;
        }
        rand::thread_rng().gen_range(self.backoff.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_sleeping() {
        let policy = RetryPolicy::default();
        let result = policy.run(|| async { Ok::<_, SyncError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_contention_up_to_max_attempts() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: SyncResult<()> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::Contention("lock held".into())) }
            })
            .await;
        assert!(matches!(result, Err(SyncError::Contention(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_fail_fast() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: SyncResult<()> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::Rejected("bad payload".into())) }
            })
            .await;
        assert!(matches!(result, Err(SyncError::Rejected(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_contention_clears() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SyncError::Contention("lock held".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }
}
