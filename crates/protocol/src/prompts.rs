//! Prompt template handlers.

use serde_json::{Value, json};

use palaver_core::error::{ProtocolError, Result};

use crate::dispatcher::{Dispatcher, require_str};
use crate::registry::PROMPT_CUSTOMER_SUPPORT;

impl Dispatcher {
    /// `prompts/get`: render a registered template with the caller's
    /// arguments into a ready-to-send message list.
    pub(crate) fn prompts_get(&self, params: &Value) -> Result<Value> {
        let name = require_str(params, "name")?;
        if name != PROMPT_CUSTOMER_SUPPORT {
            return Err(
                ProtocolError::CapabilityNotFound(format!("unknown prompt '{name}'")).into(),
            );
        }

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        let customer_issue = require_str(&arguments, "customer_issue")?;
        let urgency = arguments
            .get("urgency")
            .and_then(Value::as_str)
            .unwrap_or("medium");

        let text = format!(
            "You are a helpful customer support assistant.\n\n\
             Customer Issue: {customer_issue}\n\
             Urgency Level: {urgency}\n\n\
             Please provide a helpful, empathetic, and professional response to address \
             the customer's concern. Consider the urgency level in your response tone \
             and suggested next steps."
        );

        Ok(json!({
            "description": "Customer support prompt",
            "messages": [
                {
                    "role": "user",
                    "content": { "type": "text", "text": text }
                }
            ]
        }))
    }
}
