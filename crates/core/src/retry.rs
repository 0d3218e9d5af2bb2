//! Reusable bounded-retry policy with exponential backoff.
//!
//! Both external dependencies (the inference backend and the conversation
//! store) can throttle or fail transiently, and both follow the same
//! retry-then-surface discipline. Rather than scattering retry loops across
//! call sites, this module centralizes one policy parameterized by a
//! failure-kind classification.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{BackendError, StoreError};

/// How a failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Surface immediately, never retry (access denied, malformed response).
    Terminal,
    /// One extra attempt, then surface (timeouts).
    RetryOnce,
    /// Retry with exponential backoff up to the attempt cap (throttling).
    Backoff,
}

/// Classifies an error for the retry loop.
pub trait Retryable {
    fn retry_class(&self) -> RetryClass;
}

impl Retryable for BackendError {
    fn retry_class(&self) -> RetryClass {
        match self {
            BackendError::Throttled { .. } => RetryClass::Backoff,
            BackendError::Timeout(_) | BackendError::Network(_) => RetryClass::RetryOnce,
            BackendError::AccessDenied { .. }
            | BackendError::Malformed(_)
            | BackendError::NotConfigured(_) => RetryClass::Terminal,
        }
    }
}

impl Retryable for StoreError {
    fn retry_class(&self) -> RetryClass {
        match self {
            StoreError::Unavailable(_) | StoreError::Throttled { .. } => RetryClass::Backoff,
            StoreError::QueryFailed(_) | StoreError::Corrupt(_) => RetryClass::Terminal,
        }
    }
}

/// Bounded retry with doubling delay and optional jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt cap for `Backoff` failures (first try included).
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each subsequent retry.
    pub base_delay: Duration,

    /// Ceiling on any single delay.
    pub max_delay: Duration,

    /// Randomize each delay by up to +50% so concurrent callers don't
    /// retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps — for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        doubled.min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let extra_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 2);
        delay + Duration::from_millis(extra_ms)
    }

    /// Run `op` until it succeeds, its error classifies as terminal, or the
    /// attempt budget for its class is exhausted. The last error is surfaced.
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, mut op: F) -> std::result::Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let allowed = match err.retry_class() {
                        RetryClass::Terminal => attempt,
                        RetryClass::RetryOnce => 2.min(self.max_attempts.max(1)),
                        RetryClass::Backoff => self.max_attempts.max(1),
                    };
                    if attempt >= allowed {
                        return Err(err);
                    }
                    let delay = self.jittered(self.delay_for(attempt));
                    warn!(
                        op = op_name,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_op<'a>(
        calls: &'a AtomicU32,
        fail_with: BackendError,
        succeed_after: u32,
    ) -> impl FnMut() -> std::pin::Pin<
        Box<dyn Future<Output = Result<&'static str, BackendError>> + 'a>,
    > {
        move || {
            let err = fail_with.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= succeed_after {
                    Ok("ok")
                } else {
                    Err(err)
                }
            })
        }
    }

    #[tokio::test]
    async fn throttled_retried_up_to_cap() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result = policy
            .run(
                "test",
                counting_op(&calls, BackendError::Throttled { retry_after_secs: 1 }, 10),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn throttled_succeeds_within_cap() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result = policy
            .run(
                "test",
                counting_op(&calls, BackendError::Throttled { retry_after_secs: 1 }, 2),
            )
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn access_denied_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let err = BackendError::AccessDenied {
            model: "nova-pro".into(),
            message: "not entitled".into(),
        };
        let result = policy.run("test", counting_op(&calls, err, 10)).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_retried_exactly_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);
        let result = policy
            .run(
                "test",
                counting_op(&calls, BackendError::Timeout("slow".into()), 10),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result = policy
            .run(
                "test",
                counting_op(&calls, BackendError::Malformed("bad json".into()), 10),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_unavailable_is_backoff_class() {
        assert_eq!(
            StoreError::Unavailable("down".into()).retry_class(),
            RetryClass::Backoff
        );
        assert_eq!(
            StoreError::QueryFailed("syntax".into()).retry_class(),
            RetryClass::Terminal
        );
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: false,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350)); // capped
    }
}
