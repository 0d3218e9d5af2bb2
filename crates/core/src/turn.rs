//! Turn and Conversation domain types.
//!
//! A conversation is an append-only log of turns keyed by an opaque
//! conversation id. Conversations are created implicitly on first append
//! and never mutated in place — only appended to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Role};

/// Unique identifier for a conversation.
///
/// Either caller-supplied (round-tripped to continue a conversation) or
/// generated fresh when the caller omits one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single persisted message within a conversation.
///
/// `sequence_key` is assigned by the store and is strictly increasing within
/// a conversation, even when two turns share a wall-clock timestamp. Replay
/// order is defined by the sequence key alone, never by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Which conversation this turn belongs to
    pub conversation_id: ConversationId,

    /// Store-assigned position within the conversation
    pub sequence_key: i64,

    /// Who authored this turn (user or assistant; system instructions
    /// are never persisted)
    pub role: Role,

    /// The text content
    pub content: String,

    /// Opaque caller identity, if supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// When this turn was recorded
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Project this turn into an ephemeral inference message.
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = ConversationId::generate();
        let b = ConversationId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn {
            conversation_id: "conv-1".into(),
            sequence_key: 3,
            role: Role::Assistant,
            content: "Happy to help".into(),
            user_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sequence_key, 3);
        assert_eq!(back.role, Role::Assistant);
        assert_eq!(back.content, "Happy to help");
    }

    #[test]
    fn turn_projects_to_message() {
        let turn = Turn {
            conversation_id: "conv-1".into(),
            sequence_key: 0,
            role: Role::User,
            content: "Hi".into(),
            user_id: Some("alice".into()),
            created_at: Utc::now(),
        };
        let msg = turn.to_message();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hi");
    }
}
