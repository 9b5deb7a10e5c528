//! folio-agent - Tool-calling conversation loop
//!
//! One user turn alternates between a [`LanguageModel`] and the tools in a
//! [`ToolRegistry`] until the model answers without requesting tools, or
//! until the iteration bound is reached.
//!
//! The caller's identity is passed explicitly into every run and reaches
//! every tool through [`ToolContext`]; nothing about the caller is held in
//! shared state between runs.

pub mod agent;
pub mod conversation;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod tool;
pub mod tools;

pub use agent::{AgentError, AgentLoop, AgentOutcome, AgentStatus, DEFAULT_MAX_ITERATIONS};
pub use conversation::{ConversationState, Message, ToolCall, ToolResult};
pub use openai::OpenAiModel;
pub use provider::{AssistantReply, LanguageModel, ModelError};
pub use registry::{RegistryError, ToolRegistry};
pub use tool::{Tool, ToolContext, ToolDefinition, ToolError};
pub use tools::{SearchDocumentsTool, SearchWebTool};
