//! Retrying backend wrapper — bounded retries with per-attempt timeouts.
//!
//! Wraps any `Backend` and applies the shared retry policy: throttling is
//! retried with exponential backoff up to the attempt cap, timeouts get one
//! extra attempt, access-denied and malformed responses surface immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use palaver_core::backend::{Backend, InferenceRequest, InferenceResponse};
use palaver_core::error::BackendError;
use palaver_core::retry::RetryPolicy;

/// A backend that retries transient failures of an inner backend.
pub struct RetryingBackend {
    inner: Arc<dyn Backend>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn Backend>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            attempt_timeout: Duration::from_secs(60),
        }
    }

    /// Override the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

#[async_trait]
impl Backend for RetryingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(
        &self,
        request: InferenceRequest,
    ) -> std::result::Result<InferenceResponse, BackendError> {
        let inner = self.inner.clone();
        let attempt_timeout = self.attempt_timeout;
        self.policy
            .run("backend.invoke", || {
                let inner = inner.clone();
                let request = request.clone();
                async move {
                    match tokio::time::timeout(attempt_timeout, inner.invoke(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(BackendError::Timeout(format!(
                            "backend '{}' exceeded {}s attempt timeout",
                            inner.name(),
                            attempt_timeout.as_secs()
                        ))),
                    }
                }
            })
            .await
    }

    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::message::Message;
    use std::sync::Mutex;

    /// A fake backend that fails a fixed number of times before succeeding.
    struct FlakyBackend {
        error: BackendError,
        failures: Mutex<u32>,
        calls: Mutex<u32>,
    }

    impl FlakyBackend {
        fn new(error: BackendError, failures: u32) -> Self {
            Self {
                error,
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn invoke(
            &self,
            request: InferenceRequest,
        ) -> std::result::Result<InferenceResponse, BackendError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(self.error.clone());
            }
            Ok(InferenceResponse {
                text: "generated".into(),
                model: request.model,
            })
        }
    }

    /// A backend that hangs forever (for timeout testing).
    struct HangingBackend;

    #[async_trait]
    impl Backend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn invoke(
            &self,
            _request: InferenceRequest,
        ) -> std::result::Result<InferenceResponse, BackendError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn test_request() -> InferenceRequest {
        InferenceRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hello")],
            sampling: Default::default(),
        }
    }

    #[tokio::test]
    async fn throttled_retried_then_succeeds() {
        let inner = Arc::new(FlakyBackend::new(
            BackendError::Throttled { retry_after_secs: 1 },
            2,
        ));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::immediate(3));

        let result = backend.invoke(test_request()).await;
        assert_eq!(result.unwrap().text, "generated");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn throttled_surfaced_after_cap() {
        let inner = Arc::new(FlakyBackend::new(
            BackendError::Throttled { retry_after_secs: 1 },
            10,
        ));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::immediate(3));

        let result = backend.invoke(test_request()).await;
        assert!(matches!(result, Err(BackendError::Throttled { .. })));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn access_denied_never_retried() {
        let inner = Arc::new(FlakyBackend::new(
            BackendError::AccessDenied {
                model: "nova-pro".into(),
                message: "not entitled".into(),
            },
            10,
        ));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::immediate(3));

        let result = backend.invoke(test_request()).await;
        assert!(matches!(result, Err(BackendError::AccessDenied { .. })));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_never_retried() {
        let inner = Arc::new(FlakyBackend::new(
            BackendError::Malformed("garbage".into()),
            10,
        ));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::immediate(3));

        let result = backend.invoke(test_request()).await;
        assert!(matches!(result, Err(BackendError::Malformed(_))));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn timeout_retried_once() {
        let inner = Arc::new(FlakyBackend::new(
            BackendError::Timeout("slow".into()),
            10,
        ));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::immediate(5));

        let result = backend.invoke(test_request()).await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn hanging_attempt_becomes_timeout() {
        let backend = RetryingBackend::new(Arc::new(HangingBackend), RetryPolicy::immediate(1))
            .with_attempt_timeout(Duration::from_millis(50));

        let result = backend.invoke(test_request()).await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));
    }
}
