//! Nova backend implementation.
//!
//! Speaks the Converse-style invoke API used by the Nova model family:
//! - `Authorization: Bearer` key authentication
//! - System instruction as a top-level `system` block list
//! - Messages as `{role, content: [{text}]}` content blocks
//! - `inferenceConfig` for sampling parameters (`max_new_tokens`)
//! - Generated text at `output.message.content[0].text`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use palaver_core::backend::{Backend, InferenceRequest, InferenceResponse};
use palaver_core::error::BackendError;
use palaver_core::message::{Message, Role};

const DEFAULT_BASE_URL: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";

/// Nova Converse-style invoke backend.
pub struct NovaBackend {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl NovaBackend {
    /// Create a new Nova backend.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "nova".into(),
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

    /// Split out system messages; the invoke API takes them as a top-level
    /// block list, not in `messages`.
    fn extract_system(messages: &[Message]) -> (Vec<SystemBlock>, Vec<&Message>) {
        let mut system = Vec::new();
        let mut rest = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => system.push(SystemBlock {
                    text: msg.content.clone(),
                }),
                _ => rest.push(msg),
            }
        }
        (system, rest)
    }

    fn to_api_messages(messages: &[&Message]) -> Vec<NovaMessage> {
        messages
            .iter()
            .map(|msg| NovaMessage {
                role: msg.role.to_string(),
                content: vec![ContentBlock {
                    text: msg.content.clone(),
                }],
            })
            .collect()
    }
}

#[async_trait]
impl Backend for NovaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: InferenceRequest,
    ) -> std::result::Result<InferenceResponse, BackendError> {
        let url = format!("{}/model/{}/invoke", self.base_url, request.model);
        let (system, messages) = Self::extract_system(&request.messages);

        let body = NovaRequest {
            system,
            messages: Self::to_api_messages(&messages),
            inference_config: InferenceConfig {
                max_new_tokens: request.sampling.max_tokens,
                temperature: request.sampling.temperature,
                top_p: request.sampling.top_p,
            },
        };

        debug!(backend = "nova", model = %request.model, "Sending invoke request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(BackendError::Throttled { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(BackendError::AccessDenied {
                model: request.model.clone(),
                message: "backend refused the selected model".into(),
            });
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Nova API error");
            return Err(BackendError::Network(format!(
                "unexpected status {status}: {error_body}"
            )));
        }

        let api_resp: NovaResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("Failed to parse Nova response: {e}")))?;

        let text = api_resp
            .output
            .message
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| BackendError::Malformed("Empty content in Nova response".into()))?;

        Ok(InferenceResponse {
            text,
            model: request.model,
        })
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct NovaRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    messages: Vec<NovaMessage>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    text: String,
}

#[derive(Debug, Serialize)]
struct NovaMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct NovaResponse {
    output: NovaOutput,
}

#[derive(Debug, Deserialize)]
struct NovaOutput {
    message: NovaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct NovaResponseMessage {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct InferenceConfig {
    #[serde(rename = "max_new_tokens")]
    max_new_tokens: u32,
    temperature: f32,
    #[serde(rename = "top_p")]
    top_p: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_extracted() {
        let messages = vec![
            Message::system("Be helpful"),
            Message::user("Hi"),
            Message::assistant("Hello"),
        ];
        let (system, rest) = NovaBackend::extract_system(&messages);
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].text, "Be helpful");
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![Message::system("sys"), Message::user("question")];
        let (system, rest) = NovaBackend::extract_system(&messages);
        let body = NovaRequest {
            system,
            messages: NovaBackend::to_api_messages(&rest),
            inference_config: InferenceConfig {
                max_new_tokens: 500,
                temperature: 0.7,
                top_p: 0.9,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"][0]["text"], "sys");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["text"], "question");
        assert_eq!(json["inferenceConfig"]["max_new_tokens"], 500);
    }

    #[test]
    fn response_text_extraction() {
        let raw = r#"{"output":{"message":{"content":[{"text":"generated"}]}}}"#;
        let resp: NovaResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.output.message.content[0].text, "generated");
    }
}
