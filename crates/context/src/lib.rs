//! Context assembly for Palaver.
//!
//! Turns a conversation's full history plus the newest user message into
//! the ordered, token-budgeted message list sent to the inference backend.

pub mod assembler;
pub mod token;

pub use assembler::{AssembledContext, ContextAssembler, ContextBudget};
