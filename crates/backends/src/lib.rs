//! Inference backend implementations for Palaver.
//!
//! Each backend family differs only in request shaping (envelope format,
//! parameter names, auth headers); all implement `palaver_core::Backend`.
//! Swapping backends is a configuration change with no caller-visible
//! difference.

pub mod anthropic;
pub mod nova;
pub mod retrying;
pub mod router;

pub use anthropic::AnthropicBackend;
pub use nova::NovaBackend;
pub use retrying::RetryingBackend;
pub use router::{BackendRouter, build_from_config};
