use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Describes a tool's interface for the model.
/// Serialized into the `function` entry of an OpenAI-style `tools` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "search_web")
    pub name: String,
    /// When the model should reach for this tool
    pub description: String,
    /// JSON Schema describing the arguments object
    pub parameters: Value,
}

/// Per-run context handed to every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Identity of the caller whose turn is running.
    pub identity: String,
}

impl ToolContext {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

/// A capability the model may invoke mid-turn.
///
/// Tools are object-safe, Send + Sync, and async. Arguments arrive as the
/// raw JSON string the model produced.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool and return the text the model will see.
    async fn execute(&self, arguments: &str, context: &ToolContext) -> Result<String, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Decode a tool's JSON arguments into its argument struct.
pub fn parse_arguments<T: DeserializeOwned>(arguments: &str) -> Result<T, ToolError> {
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct QueryArgs {
        query: String,
    }

    #[test]
    fn test_parse_arguments() {
        let args: QueryArgs = parse_arguments(r#"{"query": "moby dick"}"#).unwrap();
        assert_eq!(args.query, "moby dick");
    }

    #[test]
    fn test_parse_arguments_rejects_missing_field() {
        let err = parse_arguments::<QueryArgs>("").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = parse_arguments::<QueryArgs>("not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid arguments"));
    }

    #[test]
    fn test_definition_display() {
        let def = ToolDefinition {
            name: "search_web".to_string(),
            description: "Search the internet".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        assert_eq!(def.to_string(), "search_web(Search the internet)");
    }
}
