//! Capability registry — the declarative table of tools, resources, and
//! prompt templates this server advertises.
//!
//! Populated once at startup and read-only afterwards. Historical tool
//! names resolve through an explicit alias table so old and new names
//! reach the same handler; resolution is exact-match and case-sensitive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Canonical name of the chat tool.
pub const TOOL_CHAT: &str = "chat_with_ai";

/// Historical name kept for backward compatibility.
pub const TOOL_CHAT_ALIAS: &str = "chat_with_nova";

/// Tool that returns a conversation's recorded history.
pub const TOOL_HISTORY: &str = "get_conversation_history";

pub const PROMPT_CUSTOMER_SUPPORT: &str = "customer_support";

pub const RESOURCE_LIST: &str = "conversations://list";
pub const RESOURCE_HISTORY_PREFIX: &str = "conversations://history/";
pub const RESOURCE_METADATA_PREFIX: &str = "conversations://metadata/";

/// Static metadata for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Static metadata for one readable resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Static metadata for one prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// The registry. Built once from the declarative tables below; holds no
/// per-request state.
pub struct CapabilityRegistry {
    tools: Vec<ToolDescriptor>,
    aliases: HashMap<String, String>,
    resources: Vec<ResourceDescriptor>,
    prompts: Vec<PromptDescriptor>,
}

impl CapabilityRegistry {
    pub fn new(model_id: &str) -> Self {
        let tools = vec![
            ToolDescriptor {
                name: TOOL_CHAT.into(),
                description: format!("Chat with the {model_id} assistant for customer support"),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "message": {
                            "type": "string",
                            "description": "The user's message"
                        },
                        "conversation_id": {
                            "type": "string",
                            "description": "Conversation ID for context tracking"
                        },
                        "user_id": {
                            "type": "string",
                            "description": "User identifier"
                        }
                    },
                    "required": ["message"]
                }),
            },
            ToolDescriptor {
                name: TOOL_HISTORY.into(),
                description: "Retrieve conversation history for a given conversation ID".into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "conversation_id": {
                            "type": "string",
                            "description": "Conversation ID to retrieve history for"
                        }
                    },
                    "required": ["conversation_id"]
                }),
            },
        ];

        let aliases = HashMap::from([(TOOL_CHAT_ALIAS.to_string(), TOOL_CHAT.to_string())]);

        let resources = vec![
            ResourceDescriptor {
                uri: RESOURCE_LIST.into(),
                name: "Conversation List".into(),
                description: "All known conversation ids".into(),
                mime_type: "application/json".into(),
            },
            ResourceDescriptor {
                uri: format!("{RESOURCE_HISTORY_PREFIX}{{conversation_id}}"),
                name: "Conversation History".into(),
                description: "Ordered turns of one conversation".into(),
                mime_type: "application/json".into(),
            },
            ResourceDescriptor {
                uri: format!("{RESOURCE_METADATA_PREFIX}{{conversation_id}}"),
                name: "Conversation Metadata".into(),
                description: "Turn count and timestamps of one conversation".into(),
                mime_type: "application/json".into(),
            },
        ];

        let prompts = vec![PromptDescriptor {
            name: PROMPT_CUSTOMER_SUPPORT.into(),
            description: "Customer support conversation prompt".into(),
            arguments: vec![
                PromptArgument {
                    name: "customer_issue".into(),
                    description: "Description of the customer's issue".into(),
                    required: true,
                },
                PromptArgument {
                    name: "urgency".into(),
                    description: "Urgency level (low, medium, high)".into(),
                    required: false,
                },
            ],
        }];

        Self {
            tools,
            aliases,
            resources,
            prompts,
        }
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn prompts(&self) -> &[PromptDescriptor] {
        &self.prompts
    }

    /// Resolve a tool name to its canonical descriptor, following the alias
    /// table. Exact-match and case-sensitive; `None` for unknown names.
    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        let canonical = self.canonical_name(name);
        self.tools.iter().find(|t| t.name == canonical)
    }

    /// The canonical name for `name`, or `name` itself when no alias maps it.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Every registered alias with its canonical target.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolves_to_canonical_descriptor() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        let via_alias = registry.resolve(TOOL_CHAT_ALIAS).unwrap();
        let via_canonical = registry.resolve(TOOL_CHAT).unwrap();
        assert_eq!(via_alias.name, via_canonical.name);
        assert_eq!(via_alias.name, TOOL_CHAT);
    }

    #[test]
    fn every_alias_has_a_registered_target() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        for (alias, canonical) in registry.aliases() {
            let resolved = registry.resolve(alias).unwrap();
            assert_eq!(resolved.name, canonical);
        }
    }

    #[test]
    fn resolution_is_case_sensitive() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        assert!(registry.resolve("Chat_With_AI").is_none());
        assert!(registry.resolve("CHAT_WITH_NOVA").is_none());
    }

    #[test]
    fn unknown_name_is_none() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        assert!(registry.resolve("delete_everything").is_none());
    }

    #[test]
    fn tools_list_contains_both_tools() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&TOOL_CHAT));
        assert!(names.contains(&TOOL_HISTORY));
    }

    #[test]
    fn tool_schema_serializes_with_camel_case_key() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        let wire = serde_json::to_value(registry.resolve(TOOL_CHAT).unwrap()).unwrap();
        assert!(wire.get("inputSchema").is_some());
        assert_eq!(wire["inputSchema"]["required"][0], "message");
    }

    #[test]
    fn three_resource_uris_registered() {
        let registry = CapabilityRegistry::new("nova-lite-v1");
        assert_eq!(registry.resources().len(), 3);
        assert!(
            registry
                .resources()
                .iter()
                .any(|r| r.uri == RESOURCE_LIST)
        );
    }
}
