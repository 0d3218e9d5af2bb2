//! Direct sampling handler: one-shot inference without persistence.
//!
//! `sampling/createMessage` takes the caller's message list, extracts the
//! newest user message, and invokes the default backend. No turn is
//! appended; the caller owns whatever context they sent.

use serde_json::{Value, json};
use tracing::debug;

use palaver_core::backend::{InferenceRequest, SamplingParams};
use palaver_core::error::{BackendError, ProtocolError, Result};

use crate::dispatcher::Dispatcher;

impl Dispatcher {
    pub(crate) async fn sampling_create_message(&self, params: &Value) -> Result<Value> {
        let messages = params
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::InvalidParams("missing required param 'messages'".into()))?;

        let user_message = newest_user_text(messages).ok_or_else(|| {
            ProtocolError::InvalidParams("no user message found in sampling request".into())
        })?;

        // Sampling overrides come from the request, falling back to the
        // configured defaults.
        let sampling = SamplingParams {
            max_tokens: params
                .get("maxTokens")
                .and_then(Value::as_u64)
                .map(|v| v as u32)
                .unwrap_or(self.sampling.max_tokens),
            temperature: params
                .get("temperature")
                .and_then(Value::as_f64)
                .map(|v| v as f32)
                .unwrap_or(self.sampling.temperature),
            top_p: self.sampling.top_p,
        };

        let context = self.assembler.assemble(&[], &user_message)?;
        debug!(model = %self.model_id, "Direct sampling request");

        let (backend, model) = self
            .router
            .resolve(&self.model_id)
            .ok_or_else(|| BackendError::NotConfigured(self.model_id.clone()))?;

        let response = backend
            .invoke(InferenceRequest {
                model,
                messages: context.messages,
                sampling,
            })
            .await?;

        Ok(json!({
            "role": "assistant",
            "content": { "type": "text", "text": response.text },
            "model": response.model,
            "stopReason": "endTurn",
        }))
    }
}

/// The newest user message's text. Content may be a bare string or a list
/// of typed content blocks.
fn newest_user_text(messages: &[Value]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .and_then(|m| m.get("content"))
        .and_then(content_text)
}

fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => blocks
            .iter()
            .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
