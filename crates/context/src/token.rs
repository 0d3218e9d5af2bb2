//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers on English
//! text, which is plenty for history trimming — the budget is advisory,
//! not a hard cap.

use palaver_core::turn::Turn;

/// Per-message overhead for role name, delimiters, and formatting markers
/// in the API wire format.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a persisted turn including per-message overhead.
pub fn estimate_turn_tokens(turn: &Turn) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&turn.content)
}
