//! Resource read handlers.
//!
//! The three `conversations://` URIs map directly onto conversation store
//! reads; nothing here mutates state.

use serde_json::{Value, json};

use palaver_core::error::{Error, ProtocolError, Result};
use palaver_core::turn::ConversationId;

use crate::dispatcher::{Dispatcher, require_str};
use crate::registry::{RESOURCE_HISTORY_PREFIX, RESOURCE_LIST, RESOURCE_METADATA_PREFIX};

impl Dispatcher {
    pub(crate) async fn resources_read(&self, params: &Value) -> Result<Value> {
        let uri = require_str(params, "uri")?;

        let payload = if uri == RESOURCE_LIST {
            self.read_conversation_list().await?
        } else if let Some(id) = uri.strip_prefix(RESOURCE_HISTORY_PREFIX) {
            self.read_conversation_turns(id).await?
        } else if let Some(id) = uri.strip_prefix(RESOURCE_METADATA_PREFIX) {
            self.read_conversation_metadata(id).await?
        } else {
            return Err(
                ProtocolError::CapabilityNotFound(format!("unknown resource '{uri}'")).into(),
            );
        };

        Ok(json!({
            "contents": [
                {
                    "uri": uri,
                    "mimeType": "application/json",
                    "text": serde_json::to_string_pretty(&payload)?,
                }
            ]
        }))
    }

    async fn read_conversation_list(&self) -> Result<Value> {
        let ids = self
            .store_retry
            .run("store.list", || self.store.list_conversations())
            .await
            .map_err(Error::Store)?;

        let count = ids.len();
        Ok(json!({
            "conversations": ids,
            "count": count,
        }))
    }

    async fn read_conversation_turns(&self, id: &str) -> Result<Value> {
        let conversation_id = ConversationId::from(id);
        let turns = self
            .store_retry
            .run("store.read", || self.store.read(&conversation_id))
            .await
            .map_err(Error::Store)?;

        let turn_count = turns.len();
        Ok(json!({
            "conversation_id": id,
            "turns": turns,
            "turn_count": turn_count,
        }))
    }

    async fn read_conversation_metadata(&self, id: &str) -> Result<Value> {
        let conversation_id = ConversationId::from(id);
        let metadata = self
            .store_retry
            .run("store.metadata", || self.store.metadata(&conversation_id))
            .await
            .map_err(Error::Store)?
            .ok_or_else(|| {
                ProtocolError::InvalidParams(format!("no turns recorded for conversation '{id}'"))
            })?;

        Ok(serde_json::to_value(metadata)?)
    }
}
