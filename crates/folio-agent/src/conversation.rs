use serde::{Deserialize, Serialize};

/// A model-issued request to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, echoed back in the matching result
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

/// Outcome of one tool call, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the ToolCall this answers
    pub call_id: String,
    /// Name of the tool that was called
    pub name: String,
    /// Text the model sees; describes the failure when `is_error` is set
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(call: &ToolCall, reason: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: reason.into(),
            is_error: true,
        }
    }
}

/// One entry of the conversation, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool(ToolResult),
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User { content } | Self::Assistant { content, .. } => content,
            Self::Tool(result) => &result.content,
        }
    }
}

/// Working state of one user turn: prior history, the new message, and
/// everything appended while the loop runs.
///
/// Append-only. The whole sequence is the context sent to the model on
/// every iteration.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<Message>,
    identity: String,
}

impl ConversationState {
    pub fn new(history: Vec<Message>, user_message: impl Into<String>, identity: impl Into<String>) -> Self {
        let mut messages = history;
        messages.push(Message::user(user_message));
        Self {
            messages,
            identity: identity.into(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Content of the most recent assistant message with any text.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant { content, .. } if !content.trim().is_empty() => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "search_web".to_string(),
            arguments: r#"{"query":"melville"}"#.to_string(),
        }
    }

    #[test]
    fn test_message_serialization_is_role_tagged() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Message::assistant("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hello"}));

        let json = serde_json::to_value(Message::Tool(ToolResult::success(&call(), "found"))).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["call_id"], "call_1");
        assert_eq!(json["is_error"], false);
    }

    #[test]
    fn test_history_file_format() {
        let history: Vec<Message> = serde_json::from_str(
            r#"[
                {"role": "user", "content": "Who wrote Moby-Dick?"},
                {"role": "assistant", "content": "Herman Melville."}
            ]"#,
        )
        .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::assistant("Herman Melville."));
    }

    #[test]
    fn test_state_appends_user_message() {
        let state = ConversationState::new(vec![Message::assistant("earlier")], "now", "alice");
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1], Message::user("now"));
        assert_eq!(state.identity(), "alice");
    }

    #[test]
    fn test_last_assistant_text_skips_empty_and_tool_messages() {
        let mut state = ConversationState::new(Vec::new(), "q", "alice");
        state.push(Message::assistant("Let me look that up."));
        state.push(Message::Assistant {
            content: String::new(),
            tool_calls: vec![call()],
        });
        state.push(Message::Tool(ToolResult::failure(&call(), "boom")));
        assert_eq!(state.last_assistant_text(), Some("Let me look that up."));
    }
}
