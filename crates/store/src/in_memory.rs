//! In-memory store — useful for testing and ephemeral sessions.
//!
//! The sequence key is a per-conversation counter advanced under the write
//! lock, so two appends can never collide even with identical timestamps.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use palaver_core::error::StoreError;
use palaver_core::message::Role;
use palaver_core::store::{ConversationMetadata, ConversationStore};
use palaver_core::turn::{ConversationId, Turn};

/// An in-memory conversation store backed by a HashMap of turn logs.
pub struct MemoryStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<Turn>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<Turn, StoreError> {
        let mut conversations = self.conversations.write().await;
        let log = conversations.entry(conversation_id.clone()).or_default();
        let sequence_key = log.last().map(|t| t.sequence_key + 1).unwrap_or(0);
        let turn = Turn {
            conversation_id: conversation_id.clone(),
            sequence_key,
            role,
            content: content.to_string(),
            user_id: user_id.map(str::to_string),
            created_at: Utc::now(),
        };
        log.push(turn.clone());
        Ok(turn)
    }

    async fn read(&self, conversation_id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError> {
        let conversations = self.conversations.read().await;
        let mut ids: Vec<ConversationId> = conversations.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn metadata(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ConversationMetadata>, StoreError> {
        let conversations = self.conversations.read().await;
        let Some(log) = conversations.get(conversation_id) else {
            return Ok(None);
        };
        let (Some(first), Some(last)) = (log.first(), log.last()) else {
            return Ok(None);
        };
        Ok(Some(ConversationMetadata {
            conversation_id: conversation_id.clone(),
            turn_count: log.len(),
            created_at: first.created_at,
            updated_at: last.created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_read_in_order() {
        let store = MemoryStore::new();
        let id: ConversationId = "conv-1".into();
        store.append(&id, Role::User, "Hi", Some("alice")).await.unwrap();
        store
            .append(&id, Role::Assistant, "Hello!", None)
            .await
            .unwrap();

        let turns = store.read(&id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert!(turns[0].sequence_key < turns[1].sequence_key);
    }

    #[tokio::test]
    async fn read_unknown_conversation_is_empty() {
        let store = MemoryStore::new();
        let turns = store.read(&"nope".into()).await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn coincident_timestamps_get_distinct_keys() {
        // Appends happen fast enough that created_at often collides at
        // clock resolution; sequence keys must still be strictly ordered.
        let store = MemoryStore::new();
        let id: ConversationId = "conv-2".into();
        let a = store.append(&id, Role::User, "q", None).await.unwrap();
        let b = store.append(&id, Role::Assistant, "a", None).await.unwrap();
        assert_ne!(a.sequence_key, b.sequence_key);
        assert!(a.sequence_key < b.sequence_key);
    }

    #[tokio::test]
    async fn concurrent_appends_keep_strict_order() {
        let store = Arc::new(MemoryStore::new());
        let id: ConversationId = "conv-3".into();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(&id, Role::User, &format!("msg {i}"), None)
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let turns = store.read(&id).await.unwrap();
        assert_eq!(turns.len(), 20);
        for pair in turns.windows(2) {
            assert!(pair[0].sequence_key < pair[1].sequence_key);
        }
    }

    #[tokio::test]
    async fn repeated_reads_are_stable() {
        let store = MemoryStore::new();
        let id: ConversationId = "conv-4".into();
        for i in 0..5 {
            store
                .append(&id, Role::User, &format!("m{i}"), None)
                .await
                .unwrap();
        }
        let first = store.read(&id).await.unwrap();
        let second = store.read(&id).await.unwrap();
        let keys: Vec<i64> = first.iter().map(|t| t.sequence_key).collect();
        let keys2: Vec<i64> = second.iter().map(|t| t.sequence_key).collect();
        assert_eq!(keys, keys2);
    }

    #[tokio::test]
    async fn metadata_counts_turns() {
        let store = MemoryStore::new();
        let id: ConversationId = "conv-5".into();
        assert!(store.metadata(&id).await.unwrap().is_none());

        store.append(&id, Role::User, "one", None).await.unwrap();
        store.append(&id, Role::Assistant, "two", None).await.unwrap();

        let meta = store.metadata(&id).await.unwrap().unwrap();
        assert_eq!(meta.turn_count, 2);
        assert!(meta.updated_at >= meta.created_at);
    }

    #[tokio::test]
    async fn list_conversations_sorted() {
        let store = MemoryStore::new();
        store.append(&"b".into(), Role::User, "x", None).await.unwrap();
        store.append(&"a".into(), Role::User, "y", None).await.unwrap();
        let ids = store.list_conversations().await.unwrap();
        assert_eq!(ids, vec!["a".into(), "b".into()]);
    }
}
