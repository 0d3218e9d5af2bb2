//! ConversationStore trait — durable per-conversation append-only logs.
//!
//! The store is the only shared mutable resource in the system. Correctness
//! under concurrent appends relies on the store's own atomic-append and
//! strictly-increasing-key guarantee, never on in-process locks, because
//! multiple server instances may run with no shared memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::Role;
use crate::turn::{ConversationId, Turn};

/// Summary information about a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub conversation_id: ConversationId,

    /// Number of turns recorded
    pub turn_count: usize,

    /// When the first turn was recorded
    pub created_at: DateTime<Utc>,

    /// When the most recent turn was recorded
    pub updated_at: DateTime<Utc>,
}

/// The core ConversationStore trait.
///
/// Implementations: SQLite (durable), in-memory (tests and ephemeral runs).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The store name (e.g. "sqlite", "memory").
    fn name(&self) -> &str;

    /// Append one turn to a conversation, creating the conversation
    /// implicitly if it does not exist.
    ///
    /// The store assigns the sequence key atomically: keys are strictly
    /// increasing within a conversation even when a user turn and its
    /// paired assistant turn are appended back-to-back with coincident
    /// timestamps.
    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
        user_id: Option<&str>,
    ) -> std::result::Result<Turn, StoreError>;

    /// Read all turns of a conversation in ascending sequence order.
    /// A conversation with no turns yields an empty list, not an error.
    async fn read(
        &self,
        conversation_id: &ConversationId,
    ) -> std::result::Result<Vec<Turn>, StoreError>;

    /// List all known conversation ids.
    async fn list_conversations(
        &self,
    ) -> std::result::Result<Vec<ConversationId>, StoreError>;

    /// Summary metadata for one conversation, or `None` if it has no turns.
    async fn metadata(
        &self,
        conversation_id: &ConversationId,
    ) -> std::result::Result<Option<ConversationMetadata>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes() {
        let meta = ConversationMetadata {
            conversation_id: "conv-7".into(),
            turn_count: 4,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("conv-7"));
        assert!(json.contains("\"turn_count\":4"));
    }
}
