//! Chat tool handlers: the full read-assemble-invoke-append cycle.
//!
//! A store failure after inference succeeded is a first-class outcome
//! (`ResponseNotRecorded`), not a generic internal error: the caller got a
//! response that a later `read` will not replay, and operators need to tell
//! that apart from a full request failure.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use palaver_core::backend::InferenceRequest;
use palaver_core::error::{BackendError, Error, ProtocolError, Result, StoreError};
use palaver_core::message::Role;
use palaver_core::turn::ConversationId;

use crate::dispatcher::{Dispatcher, text_content};

#[derive(Debug, Deserialize)]
struct ChatArgs {
    message: String,
    conversation_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryArgs {
    conversation_id: String,
}

impl Dispatcher {
    /// `chat_with_ai`: one conversational exchange.
    ///
    /// Reads history, assembles the budgeted context, invokes the backend,
    /// then appends the user turn and the assistant turn. A fresh
    /// conversation id is generated when the caller omits one and returned
    /// in the result payload so the caller can continue the conversation.
    pub(crate) async fn chat(&self, arguments: Value) -> Result<Value> {
        let args: ChatArgs = parse_args(arguments)?;

        let conversation_id = match args.conversation_id {
            Some(id) => ConversationId::from(id),
            None => ConversationId::generate(),
        };
        let user_id = args.user_id.as_deref();

        let history = self
            .store_retry
            .run("store.read", || self.store.read(&conversation_id))
            .await
            .map_err(Error::Store)?;

        let context = self.assembler.assemble(&history, &args.message)?;
        info!(
            conversation_id = %conversation_id,
            turns_included = context.turns_included,
            turns_dropped = context.turns_dropped,
            "Assembled chat context"
        );

        let (backend, model) = self
            .router
            .resolve(&self.model_id)
            .ok_or_else(|| BackendError::NotConfigured(self.model_id.clone()))?;

        let response = backend
            .invoke(InferenceRequest {
                model,
                messages: context.messages,
                sampling: self.sampling,
            })
            .await?;

        // Persist both turns only after inference succeeded; a failure
        // here must not discard the generated response silently.
        self.record_turn(&conversation_id, Role::User, &args.message, user_id, &response.text)
            .await?;
        self.record_turn(
            &conversation_id,
            Role::Assistant,
            &response.text,
            user_id,
            &response.text,
        )
        .await?;

        text_content(&json!({
            "response": response.text,
            "conversation_id": conversation_id.as_str(),
            "user_id": args.user_id.as_deref().unwrap_or("anonymous"),
            "model_id": response.model,
            "conversation_length": history.len() + 2,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }

    /// `get_conversation_history`: the recorded turns of one conversation.
    pub(crate) async fn conversation_history(&self, arguments: Value) -> Result<Value> {
        let args: HistoryArgs = parse_args(arguments)?;
        let conversation_id = ConversationId::from(args.conversation_id);

        let history = self
            .store_retry
            .run("store.read", || self.store.read(&conversation_id))
            .await
            .map_err(Error::Store)?;

        text_content(&json!({
            "conversation_id": conversation_id.as_str(),
            "history": history,
            "total_turns": history.len(),
            "retrieved_at": Utc::now().to_rfc3339(),
        }))
    }

    async fn record_turn(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
        user_id: Option<&str>,
        generated_response: &str,
    ) -> std::result::Result<(), Error> {
        self.store_retry
            .run("store.append", || {
                self.store.append(conversation_id, role, content, user_id)
            })
            .await
            .map(drop)
            .map_err(|source: StoreError| Error::ResponseNotRecorded {
                conversation_id: conversation_id.to_string(),
                response: generated_response.to_string(),
                source,
            })
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| ProtocolError::InvalidParams(e.to_string()).into())
}
