//! JSON-RPC protocol layer for Palaver.
//!
//! The dispatcher parses inbound envelopes, routes them to capability
//! handlers, and shapes every outcome (success or failure) into a
//! well-formed response envelope. The capability registry is the single
//! declarative table of tools, resources, and prompts, including the
//! backward-compatibility alias map.

pub mod dispatcher;
pub mod envelope;
pub mod registry;

mod chat;
mod prompts;
mod resources;
mod sampling;

pub use dispatcher::{DEFAULT_SYSTEM_INSTRUCTION, Dispatcher, PROTOCOL_VERSION};
pub use envelope::{ErrorObject, JsonRpcRequest, JsonRpcResponse, codes};
pub use registry::{CapabilityRegistry, PromptDescriptor, ResourceDescriptor, ToolDescriptor};
