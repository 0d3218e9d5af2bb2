//! # Palaver Core
//!
//! Domain types, traits, and error definitions for the Palaver conversation
//! server. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external dependency of the request path is defined as a trait here:
//! the inference backend and the conversation store. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod message;
pub mod retry;
pub mod store;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use backend::{Backend, InferenceRequest, InferenceResponse, SamplingParams};
pub use error::{BackendError, ContextError, Error, ProtocolError, Result, StoreError};
pub use message::{Message, Role};
pub use retry::{RetryClass, RetryPolicy, Retryable};
pub use store::{ConversationMetadata, ConversationStore};
pub use turn::{ConversationId, Turn};
