//! Jittered exponential backoff for external collaborator calls.
//! Reused by `sim-graph`, `sim-profile`, and `sim-report` for every LLM/graph-backend call site.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Multiplies each computed delay by `0.5 + random()` before sleeping, to avoid
    /// retry storms against the same backend.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jittered = if self.jitter {
            let factor = 0.5 + rand::thread_rng().gen::<f64>();
            capped * factor
        } else {
            capped
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// One failed item from [`call_batch_with_retry`], carrying the item back so the caller
/// can apply a fallback.
#[derive(Debug, Clone)]
pub struct BatchFailure<T> {
    pub index: usize,
    pub item: T,
    pub error: String,
}

/// Calls `f` until it succeeds or `policy.max_retries` additional attempts are
/// exhausted, sleeping a jittered, exponentially growing delay between attempts.
pub async fn call_with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt == policy.max_retries {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %err,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retries each item of `items` independently via [`call_with_retry`], collecting
/// successes and failures rather than aborting the whole batch on one item's
/// exhausted retries; every caller wants a partial result rather than an all-or-nothing batch.
pub async fn call_batch_with_retry<T, R, E, F, Fut>(
    policy: &RetryPolicy,
    items: Vec<T>,
    mut f: F,
) -> (Vec<R>, Vec<BatchFailure<T>>)
where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: fmt::Display,
{
    let mut results = Vec::with_capacity(items.len());
    let mut failures = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        let item_for_error = item.clone();
        let outcome = call_with_retry(policy, || f(item.clone())).await;
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => {
                let message = err.to_string();
                tracing::error!(index, %message, "batch item exhausted retries");
                failures.push(BatchFailure {
                    index,
                    item: item_for_error,
                    error: message,
                });
            }
        }
    }

    (results, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn call_with_retry_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
            jitter: false,
        };

        let result: Result<u32, String> = call_with_retry(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn call_with_retry_returns_last_error_when_exhausted() {
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            jitter: false,
        };

        let result: Result<u32, String> =
            call_with_retry(&policy, || async { Err::<u32, _>("always fails".to_string()) })
                .await;

        assert_eq!(result, Err("always fails".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn call_batch_with_retry_collects_partial_failures() {
        let policy = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            jitter: false,
        };

        let items = vec![1, 2, 3];
        let (results, failures) = call_batch_with_retry(&policy, items, |item| async move {
            if item == 2 {
                Err::<u32, String>("boom".to_string())
            } else {
                Ok(item * 10)
            }
        })
        .await;

        assert_eq!(results, vec![10, 30]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].item, 2);
    }
}
