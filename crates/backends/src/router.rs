//! Backend router — selects the correct inference backend from config.
//!
//! The dispatcher resolves a model selector through the router and never
//! touches a concrete backend type.

use std::collections::HashMap;
use std::sync::Arc;

use palaver_core::backend::Backend;

use crate::anthropic::AnthropicBackend;
use crate::nova::NovaBackend;
use crate::retrying::RetryingBackend;

/// Routes inference requests to the correct backend.
pub struct BackendRouter {
    backends: HashMap<String, Arc<dyn Backend>>,
    default_backend: String,
}

impl BackendRouter {
    /// Create a new router with a default backend name.
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            backends: HashMap::new(),
            default_backend: default_backend.into(),
        }
    }

    /// Register a backend.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Get the default backend.
    pub fn default_backend(&self) -> Option<Arc<dyn Backend>> {
        self.backends.get(&self.default_backend).cloned()
    }

    /// Get a specific backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(name).cloned()
    }

    /// Resolve a model selector like "anthropic/claude-sonnet-4" to a
    /// backend plus the bare model id. Selectors without a registered
    /// backend prefix go to the default backend unchanged.
    pub fn resolve(&self, model_selector: &str) -> Option<(Arc<dyn Backend>, String)> {
        if let Some((prefix, model)) = model_selector.split_once('/') {
            if let Some(backend) = self.get(prefix) {
                return Some((backend, model.to_string()));
            }
        }
        self.default_backend()
            .map(|b| (b, model_selector.to_string()))
    }

    /// List all registered backend names.
    pub fn list(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }
}

/// Build backends from configuration, each wrapped with the shared retry
/// policy.
pub fn build_from_config(config: &palaver_config::AppConfig) -> BackendRouter {
    let mut router = BackendRouter::new(&config.default_backend);
    let policy = config.retry.to_policy();

    for (name, backend_config) in &config.backends {
        let api_key = backend_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let backend = build_backend(name, &api_key, backend_config.api_url.as_deref());
        router.register(
            name.clone(),
            Arc::new(RetryingBackend::new(backend, policy.clone())),
        );
    }

    // Ensure the default backend exists even if not explicitly configured.
    if router.get(&config.default_backend).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let backend = build_backend(&config.default_backend, &api_key, None);
        router.register(
            config.default_backend.clone(),
            Arc::new(RetryingBackend::new(backend, policy)),
        );
    }

    router
}

fn build_backend(name: &str, api_key: &str, api_url: Option<&str>) -> Arc<dyn Backend> {
    match name {
        "anthropic" => {
            let mut backend = AnthropicBackend::new(api_key);
            if let Some(url) = api_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
        _ => {
            let mut backend = NovaBackend::new(api_key);
            if let Some(url) = api_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
    }
}
