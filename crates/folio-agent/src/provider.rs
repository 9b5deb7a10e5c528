use crate::conversation::{Message, ToolCall};
use crate::tool::ToolDefinition;
use async_trait::async_trait;

/// What the model returned for one inference: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// The language-model collaborator driven by the agent loop.
///
/// Defined here, by the consumer; the OpenAI-compatible client in
/// [`crate::openai`] is one implementation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one inference over the full message sequence with the given tools available.
    async fn infer(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<AssistantReply, ModelError>;

    /// Model name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("API key not set: export {0}")]
    MissingApiKey(String),
}

/// Scripted model for testing the agent loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued replies in order and records every message sequence it was given.
    #[derive(Default)]
    pub struct MockModel {
        replies: Mutex<VecDeque<Result<AssistantReply, ModelError>>>,
        calls: Mutex<Vec<Vec<Message>>>,
        tools_seen: Mutex<Vec<Vec<String>>>,
    }

    impl MockModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_text(&self, text: &str) {
            self.queue(Ok(AssistantReply::text(text)));
        }

        /// Queue a reply requesting one tool call with the given JSON arguments.
        pub fn queue_tool_call(&self, id: &str, name: &str, arguments: serde_json::Value) {
            self.queue_tool_calls(vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }]);
        }

        pub fn queue_tool_calls(&self, tool_calls: Vec<ToolCall>) {
            self.queue(Ok(AssistantReply {
                content: String::new(),
                tool_calls,
            }));
        }

        pub fn queue_error(&self, error: ModelError) {
            self.queue(Err(error));
        }

        pub fn queue(&self, reply: Result<AssistantReply, ModelError>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        /// Message sequences received, one per inference.
        pub fn calls(&self) -> Vec<Vec<Message>> {
            self.calls.lock().unwrap().clone()
        }

        /// Tool names offered on each inference.
        pub fn tools_seen(&self) -> Vec<Vec<String>> {
            self.tools_seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for MockModel {
        async fn infer(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<AssistantReply, ModelError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.tools_seen
                .lock()
                .unwrap()
                .push(tools.iter().map(|t| t.name.clone()).collect());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::InvalidResponse("mock reply queue is empty".to_string())))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockModel;
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_in_order_and_records() {
        let model = MockModel::new();
        model.queue_tool_call("call_1", "search_web", serde_json::json!({"query": "x"}));
        model.queue_text("done");

        let first = model.infer(&[Message::user("a")], &[]).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].arguments, r#"{"query":"x"}"#);

        let second = model.infer(&[Message::user("b")], &[]).await.unwrap();
        assert_eq!(second, AssistantReply::text("done"));

        assert!(model.infer(&[], &[]).await.is_err());
        assert_eq!(model.calls().len(), 3);
        assert_eq!(model.calls()[1], vec![Message::user("b")]);
    }

    #[test]
    fn test_error_display() {
        let err = ModelError::Api {
            status: 500,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - overloaded");
        assert_eq!(
            ModelError::MissingApiKey("GROQ_API_KEY".to_string()).to_string(),
            "API key not set: export GROQ_API_KEY"
        );
    }
}
