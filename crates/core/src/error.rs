//! Error types for the Palaver domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Palaver operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Context assembly errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Protocol errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Inference succeeded but the turn could not be durably appended.
    /// Distinct from a full request failure: the caller got a response
    /// that the store will not replay.
    #[error(
        "Response generated but not durably recorded for conversation {conversation_id}: {source}"
    )]
    ResponseNotRecorded {
        conversation_id: String,
        response: String,
        #[source]
        source: StoreError,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from an inference backend.
///
/// `Throttled` and `Timeout` are retried by the gateway's retry policy;
/// `AccessDenied` and `Malformed` are surfaced immediately.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Backend refused model '{model}': {message}")]
    AccessDenied { model: String, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend returned a response the gateway cannot parse: {0}")]
    Malformed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

/// Failures from the conversation store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store throttled, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Stored turn is corrupt: {0}")]
    Corrupt(String),
}

/// Failures from context assembly.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// The mandatory turns (system instruction + newest message) alone
    /// exceed the model's hard input limit. No amount of history trimming
    /// can fix this, so it is surfaced instead of silently truncating.
    #[error(
        "Message too large: system ({system_tokens} tokens) + message ({message_tokens} tokens) exceed hard limit {hard_limit}"
    )]
    MessageTooLarge {
        system_tokens: usize,
        message_tokens: usize,
        hard_limit: usize,
    },
}

/// Protocol-level failures: malformed envelopes, unknown methods,
/// missing or invalid params, unresolvable capability names.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown capability: {0}")]
    CapabilityNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::Throttled {
            retry_after_secs: 5,
        });
        assert!(err.to_string().contains("Rate limited"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn not_recorded_carries_conversation_id() {
        let err = Error::ResponseNotRecorded {
            conversation_id: "conv-42".into(),
            response: "hello".into(),
            source: StoreError::Unavailable("connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("conv-42"));
        assert!(msg.contains("not durably recorded"));
    }

    #[test]
    fn protocol_error_displays_method() {
        let err = ProtocolError::MethodNotFound("tools/destroy".into());
        assert!(err.to_string().contains("tools/destroy"));
    }
}
