//! Backend trait — the abstraction over inference providers.
//!
//! A Backend knows how to send an ordered message list to a text-generation
//! model and get the generated text back. Implementations differ only in
//! request shaping (envelope format, parameter names, auth headers); callers
//! depend on this trait and can switch backends with no visible change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::Message;

/// Sampling parameters for a generation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// An ephemeral inference request. Never persisted; only the resulting
/// turn is durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// The model selector (e.g. "nova-lite-v1", "claude-sonnet-4")
    pub model: String,

    /// The assembled, ordered message list
    pub messages: Vec<Message>,

    /// Sampling parameters
    #[serde(default)]
    pub sampling: SamplingParams,
}

/// The generated output of a backend invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// The generated text
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The core Backend trait.
///
/// Every inference provider family implements this trait. The dispatcher
/// calls `invoke()` without knowing which backend is selected.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for this backend (e.g. "nova", "anthropic").
    fn name(&self) -> &str;

    /// Send an assembled message list and get generated text or a typed
    /// failure.
    async fn invoke(
        &self,
        request: InferenceRequest,
    ) -> std::result::Result<InferenceResponse, BackendError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}
