//! Timeout decorator — bounds every store call with a per-attempt timeout.
//!
//! The store is one of the two external dependencies on the request path,
//! and like the inference backend its calls must never hang the caller.
//! An elapsed attempt maps to the retryable `StoreError::Unavailable`, so
//! the shared retry policy re-runs it before surfacing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use palaver_core::error::StoreError;
use palaver_core::message::Role;
use palaver_core::store::{ConversationMetadata, ConversationStore};
use palaver_core::turn::{ConversationId, Turn};

/// A store that bounds every call of an inner store with a timeout.
pub struct TimedStore {
    inner: Arc<dyn ConversationStore>,
    attempt_timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn ConversationStore>) -> Self {
        Self {
            inner,
            attempt_timeout: Duration::from_secs(10),
        }
    }

    /// Override the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    async fn bound<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.attempt_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "store '{}' exceeded {}s attempt timeout",
                self.inner.name(),
                self.attempt_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl ConversationStore for TimedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<Turn, StoreError> {
        self.bound(self.inner.append(conversation_id, role, content, user_id))
            .await
    }

    async fn read(&self, conversation_id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        self.bound(self.inner.read(conversation_id)).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError> {
        self.bound(self.inner.list_conversations()).await
    }

    async fn metadata(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationMetadata>, StoreError> {
        self.bound(self.inner.metadata(conversation_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::MemoryStore;

    /// A store that never answers (for timeout testing).
    struct HangingStore;

    #[async_trait]
    impl ConversationStore for HangingStore {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn append(
            &self,
            _conversation_id: &ConversationId,
            _role: Role,
            _content: &str,
            _user_id: Option<&str>,
        ) -> Result<Turn, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        async fn read(&self, _conversation_id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        async fn metadata(
            &self,
            _conversation_id: &ConversationId,
        ) -> Result<Option<ConversationMetadata>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_read_becomes_unavailable() {
        let store = TimedStore::new(Arc::new(HangingStore))
            .with_attempt_timeout(Duration::from_millis(50));

        let result = store.read(&"conv-1".into()).await;
        match result {
            Err(StoreError::Unavailable(msg)) => assert!(msg.contains("attempt timeout")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_append_becomes_unavailable() {
        let store = TimedStore::new(Arc::new(HangingStore))
            .with_attempt_timeout(Duration::from_millis(50));

        let result = store.append(&"conv-1".into(), Role::User, "Hi", None).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn fast_store_passes_through() {
        let store = TimedStore::new(Arc::new(MemoryStore::new()));
        let id: ConversationId = "conv-1".into();

        let turn = store.append(&id, Role::User, "Hi", Some("alice")).await.unwrap();
        assert_eq!(turn.sequence_key, 0);

        let turns = store.read(&id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(store.name(), "memory");
    }
}
