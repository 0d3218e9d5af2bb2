//! Configuration loading, validation, and management for Palaver.
//!
//! Loads configuration from `palaver.toml` with environment variable
//! overrides. Validates all settings at startup.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use palaver_core::error::Error;
use palaver_core::retry::RetryPolicy;

/// The root configuration structure.
///
/// Maps directly to `palaver.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key shared by backends unless overridden per-backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default inference backend
    #[serde(default = "default_backend")]
    pub default_backend: String,

    /// Default model selector
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Sampling defaults for chat and sampling requests
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Conversation store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP ingress configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Retry policy tuning shared by backend and store calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Backend-specific configurations
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
}

fn default_backend() -> String {
    "nova".into()
}
fn default_model_id() -> String {
    "nova-lite-v1".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_backend", &self.default_backend)
            .field("model_id", &self.model_id)
            .field("sampling", &self.sampling)
            .field("context", &self.context)
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .field("retry", &self.retry)
            .field("backends", &self.backends)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_backend: default_backend(),
            model_id: default_model_id(),
            sampling: SamplingConfig::default(),
            context: ContextConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            retry: RetryConfig::default(),
            backends: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut config: AppConfig = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid TOML in {}: {e}", path.display()),
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `palaver.toml` in the working directory if present,
    /// otherwise defaults plus environment overrides.
    pub fn load_or_default() -> Result<Self, Error> {
        let path = Path::new("palaver.toml");
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model_id) = std::env::var("PALAVER_MODEL_ID") {
            self.model_id = model_id;
        }
        if let Ok(api_key) = std::env::var("PALAVER_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Ok(backend) = std::env::var("PALAVER_BACKEND") {
            self.default_backend = backend;
        }
    }

    /// Validate settings that would otherwise fail obscurely at runtime.
    pub fn validate(&self) -> Result<(), Error> {
        if self.model_id.is_empty() {
            return Err(Error::Config {
                message: "model_id must not be empty".into(),
            });
        }
        if self.context.max_tokens == 0 {
            return Err(Error::Config {
                message: "context.max_tokens must be positive".into(),
            });
        }
        if let Some(hard_limit) = self.context.hard_limit {
            if hard_limit < self.context.max_tokens {
                return Err(Error::Config {
                    message: format!(
                        "context.hard_limit ({hard_limit}) must not be below context.max_tokens ({})",
                        self.context.max_tokens
                    ),
                });
            }
        }
        if self.store.backend != "memory" && self.store.backend != "sqlite" {
            return Err(Error::Config {
                message: format!("unknown store backend '{}'", self.store.backend),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

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

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Advisory token budget for history included in an inference request
    #[serde(default = "default_context_tokens")]
    pub max_tokens: usize,

    /// Absolute model input cap; `None` disables the too-large check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_limit: Option<usize>,

    /// Override for the fixed system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

fn default_context_tokens() -> usize {
    4096
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_tokens(),
            hard_limit: None,
            system_instruction: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "sqlite"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database path for the sqlite backend
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "palaver.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8317
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    5000
}
fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}
