//! Anthropic backend implementation.
//!
//! Uses the Messages API:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Generated text at `content[0].text`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use palaver_core::backend::{Backend, InferenceRequest, InferenceResponse};
use palaver_core::error::BackendError;
use palaver_core::message::{Message, Role};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Messages API backend.
pub struct AnthropicBackend {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The Messages API takes the system prompt as a top-level field,
    /// not in `messages`.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut rest: Vec<&Message> = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => rest.push(msg),
            }
        }
        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, rest)
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: InferenceRequest,
    ) -> std::result::Result<InferenceResponse, BackendError> {
        let url = format!("{}/v1/messages", self.base_url);
        let (system, messages) = Self::extract_system(&request.messages);

        let api_messages: Vec<ApiMessage> = messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": api_messages,
            "max_tokens": request.sampling.max_tokens,
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
        });
        if let Some(ref sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        debug!(backend = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(e.to_string())
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(BackendError::Throttled {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(BackendError::AccessDenied {
                model: request.model.clone(),
                message: "invalid API key or model not permitted".into(),
            });
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(BackendError::Network(format!(
                "unexpected status {status}: {error_body}"
            )));
        }

        let api_resp: ApiResponse = response.json().await.map_err(|e| {
            BackendError::Malformed(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let text = api_resp
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| BackendError::Malformed("Empty content in Anthropic response".into()))?;

        Ok(InferenceResponse {
            text,
            model: api_resp.model.unwrap_or(request.model),
        })
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_joined_from_multiple_messages() {
        let messages = vec![
            Message::system("Rule one."),
            Message::user("Hi"),
            Message::system("Rule two."),
        ];
        let (system, rest) = AnthropicBackend::extract_system(&messages);
        assert_eq!(system.as_deref(), Some("Rule one.\n\nRule two."));
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn no_system_yields_none() {
        let messages = vec![Message::user("Hi")];
        let (system, rest) = AnthropicBackend::extract_system(&messages);
        assert!(system.is_none());
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn response_text_extraction() {
        let raw = r#"{"content":[{"type":"text","text":"hello"}],"model":"claude-sonnet-4"}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.content[0].text, "hello");
        assert_eq!(resp.model.as_deref(), Some("claude-sonnet-4"));
    }
}
