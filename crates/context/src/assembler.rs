//! Greedy, deterministic, order-preserving context truncation.
//!
//! Given the full conversation history and the newest user message, produce
//! the ordered message list to send to inference:
//!
//! 1. The fixed system instruction always comes first and is never trimmed.
//! 2. History is walked newest-to-oldest; whole turns are included until the
//!    next one would exceed the token budget. Turns are never split.
//! 3. The newest user message is always included — only older history is
//!    sacrificed to the budget. The budget is advisory for history trimming,
//!    not a hard cap on the mandatory messages.
//! 4. The result is chronological: system, oldest kept turn, …, new message.
//!
//! No summarization, no randomness: identical inputs produce identical
//! outputs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use palaver_core::error::ContextError;
use palaver_core::message::Message;
use palaver_core::turn::Turn;

use crate::token;

/// Token budget configuration for assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBudget {
    /// Advisory budget for included history (the system instruction and the
    /// newest message are not counted against it).
    pub max_tokens: usize,

    /// The model's absolute input cap. When the system instruction plus the
    /// newest message alone exceed it, assembly fails with
    /// [`ContextError::MessageTooLarge`] — no trimming can help.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_limit: Option<usize>,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            hard_limit: None,
        }
    }
}

/// The assembled message list, ready for a backend invocation.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// system instruction, kept history in chronological order, new message
    pub messages: Vec<Message>,

    /// Estimated tokens of included history (excluding system + new message)
    pub history_tokens: usize,

    /// Turns included from history
    pub turns_included: usize,

    /// Older turns dropped to fit the budget
    pub turns_dropped: usize,
}

/// The context assembler. Stateless — create one and reuse it.
pub struct ContextAssembler {
    system_instruction: String,
    budget: ContextBudget,
}

impl ContextAssembler {
    pub fn new(system_instruction: impl Into<String>, budget: ContextBudget) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            budget,
        }
    }

    /// Assemble the inference message list from history plus the new message.
    ///
    /// `history` must be in ascending sequence order, as returned by the
    /// conversation store.
    pub fn assemble(
        &self,
        history: &[Turn],
        new_message: &str,
    ) -> Result<AssembledContext, ContextError> {
        let system_tokens = token::estimate_tokens(&self.system_instruction);
        let message_tokens = token::estimate_tokens(new_message);

        // The mandatory messages are exempt from the advisory budget but
        // must fit the model's hard input cap when one is configured.
        if let Some(hard_limit) = self.budget.hard_limit {
            if system_tokens + message_tokens > hard_limit {
                return Err(ContextError::MessageTooLarge {
                    system_tokens,
                    message_tokens,
                    hard_limit,
                });
            }
        }

        // Walk newest-to-oldest, stop at the first turn that would overflow.
        let mut kept: Vec<Message> = Vec::new();
        let mut history_tokens = 0usize;
        for turn in history.iter().rev() {
            let cost = token::estimate_turn_tokens(turn);
            if history_tokens + cost > self.budget.max_tokens {
                break;
            }
            kept.push(turn.to_message());
            history_tokens += cost;
        }
        let turns_included = kept.len();
        let turns_dropped = history.len() - turns_included;

        // Restore chronological order.
        kept.reverse();

        let mut messages = Vec::with_capacity(turns_included + 2);
        messages.push(Message::system(&self.system_instruction));
        messages.extend(kept);
        messages.push(Message::user(new_message));

        if turns_dropped > 0 {
            debug!(
                turns_dropped,
                turns_included, history_tokens, "Trimmed oldest turns to fit budget"
            );
        }

        Ok(AssembledContext {
            messages,
            history_tokens,
            turns_included,
            turns_dropped,
        })
    }
}
