//! Bounded exponential backoff with jitter, shared by both extraction paths.
//!
//! The policy is a plain value so the two network layers can carry identical
//! retry behavior and tests can shrink the delays to nothing.

use log::warn;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy: attempt count, base delay, delay cap and jitter fraction.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Fraction of the delay randomized away, in `[0, 1]`. A value of 0.2
    /// means each sleep is drawn uniformly from `[0.8 * d, d]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries; useful for tests and non-idempotent calls.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return delay;
        }
        let factor = 1.0 - rand::thread_rng().gen_range(0.0..jitter);
        delay.mul_f64(factor)
    }
}

/// Runs `op` until it succeeds, it fails terminally, or the policy's attempt
/// budget is exhausted. `is_transient` decides whether an error is worth
/// retrying; terminal errors are returned immediately with zero further
/// attempts.
///
/// Returns the last error once attempts are exhausted.
pub async fn retry_with_policy<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    what: &str,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut delay = policy.base_delay;
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let sleep = policy.jittered(delay.min(policy.max_delay));
                warn!(
                    "{what} failed (attempt {attempt}/{max_attempts}), retrying in {:?}: {e}",
                    sleep
                );
                tokio::time::sleep(sleep).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("retry loop returns within the attempt budget")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry_with_policy(&fast_policy(5), "op", |_| true, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 4 {
                    Err(format!("transient {n}"))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn terminal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_with_policy(&fast_policy(5), "op", |e: &String| e.starts_with("transient"), || {
                async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("terminal".to_string())
                }
            })
            .await;
        assert_eq!(result.unwrap_err(), "terminal");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_with_policy(&fast_policy(3), "op", |_| true, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("transient {n}"))
            })
            .await;
        assert_eq!(result.unwrap_err(), "transient 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
