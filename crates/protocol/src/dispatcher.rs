//! Protocol dispatcher — parses envelopes, routes methods, shapes responses.
//!
//! The dispatcher holds no mutable state beyond references to the registry,
//! the store, and the backend router, so one instance serves any number of
//! concurrent requests. Every failure path yields a well-formed response
//! envelope; nothing here panics on caller input.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use palaver_backends::BackendRouter;
use palaver_config::AppConfig;
use palaver_context::{ContextAssembler, ContextBudget};
use palaver_core::backend::SamplingParams;
use palaver_core::error::{Error, ProtocolError, Result};
use palaver_core::retry::RetryPolicy;
use palaver_core::store::ConversationStore;

use crate::envelope::{JsonRpcResponse, parse_request};
use crate::registry::{CapabilityRegistry, TOOL_CHAT, TOOL_HISTORY};

/// Negotiated protocol revision returned by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "palaver";

/// Used when the configuration does not override the system instruction.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful customer support assistant. \
    You provide accurate, helpful, and empathetic responses to customer inquiries. \
    Use the conversation history to maintain context and provide personalized assistance.";

pub struct Dispatcher {
    pub(crate) registry: CapabilityRegistry,
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) router: BackendRouter,
    pub(crate) assembler: ContextAssembler,
    pub(crate) model_id: String,
    pub(crate) sampling: SamplingParams,
    pub(crate) store_retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(config: &AppConfig, store: Arc<dyn ConversationStore>, router: BackendRouter) -> Self {
        let system_instruction = config
            .context
            .system_instruction
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());
        let budget = ContextBudget {
            max_tokens: config.context.max_tokens,
            hard_limit: config.context.hard_limit,
        };

        Self {
            registry: CapabilityRegistry::new(&config.model_id),
            store,
            router,
            assembler: ContextAssembler::new(system_instruction, budget),
            model_id: config.model_id.clone(),
            sampling: SamplingParams {
                max_tokens: config.sampling.max_tokens,
                temperature: config.sampling.temperature,
                top_p: config.sampling.top_p,
            },
            store_retry: config.retry.to_policy(),
        }
    }

    /// Handle one raw envelope body.
    ///
    /// Returns `None` for notifications (absent `id`), which expect no
    /// response even when their handling fails.
    pub async fn handle(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request = match parse_request(raw) {
            Ok(request) => request,
            Err((id, err)) => {
                return Some(JsonRpcResponse::from_error(
                    id.unwrap_or(Value::Null),
                    &Error::Protocol(err),
                ));
            }
        };

        debug!(method = %request.method, notification = request.id.is_none(), "Dispatching envelope");

        let outcome = self.dispatch(&request.method, &request.params).await;

        let Some(id) = request.id else {
            if let Err(err) = outcome {
                warn!(method = %request.method, error = %err, "Notification handling failed, no response sent");
            }
            return None;
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                warn!(method = %request.method, error = %err, "Request failed");
                JsonRpcResponse::from_error(id, &err)
            }
        })
    }

    async fn dispatch(&self, method: &str, params: &Value) -> Result<Value> {
        match method {
            "initialize" => self.initialize(params),
            "notifications/initialized" => {
                info!("Client initialization completed");
                Ok(json!({}))
            }
            "tools/list" => Ok(json!({ "tools": self.registry.tools() })),
            "tools/call" => self.tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": self.registry.resources() })),
            "resources/read" => self.resources_read(params).await,
            "prompts/list" => Ok(json!({ "prompts": self.registry.prompts() })),
            "prompts/get" => self.prompts_get(params),
            "sampling/createMessage" => self.sampling_create_message(params).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string()).into()),
        }
    }

    fn initialize(&self, params: &Value) -> Result<Value> {
        let protocol_version = require_str(params, "protocolVersion")?;
        let client = params
            .get("clientInfo")
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client, requested = protocol_version, "Initialize request");

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {},
                "prompts": {},
                "experimental": { "sampling": true }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    async fn tools_call(&self, params: &Value) -> Result<Value> {
        let name = require_str(params, "name")?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        // Alias resolution happens once, here, before any handler runs.
        let descriptor = self
            .registry
            .resolve(name)
            .ok_or_else(|| ProtocolError::CapabilityNotFound(format!("unknown tool '{name}'")))?;

        match descriptor.name.as_str() {
            TOOL_CHAT => self.chat(arguments).await,
            TOOL_HISTORY => self.conversation_history(arguments).await,
            other => Err(Error::Internal(format!(
                "tool '{other}' is registered but has no handler"
            ))),
        }
    }
}

/// Extract a required string field from `params`.
pub(crate) fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProtocolError::InvalidParams(format!("missing required param '{key}'")).into())
}

/// Wrap a tool result payload the way the protocol expects: one text
/// content block holding the pretty-printed JSON.
pub(crate) fn text_content(payload: &Value) -> Result<Value> {
    let text = serde_json::to_string_pretty(payload)?;
    Ok(json!({
        "content": [
            { "type": "text", "text": text }
        ]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_str_rejects_missing_and_empty() {
        assert!(require_str(&json!({}), "name").is_err());
        assert!(require_str(&json!({"name": ""}), "name").is_err());
        assert!(require_str(&json!({"name": 42}), "name").is_err());
        assert_eq!(require_str(&json!({"name": "x"}), "name").unwrap(), "x");
    }

    #[test]
    fn text_content_wraps_pretty_json() {
        let wrapped = text_content(&json!({"response": "hi"})).unwrap();
        let text = wrapped["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"response\": \"hi\""));
        assert_eq!(wrapped["content"][0]["type"], "text");
    }
}
