use crate::conversation::{ConversationState, Message, ToolCall, ToolResult};
use crate::provider::{LanguageModel, ModelError};
use crate::registry::ToolRegistry;
use crate::tool::ToolContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Model invocations allowed per user turn unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Answer returned when the bound is hit before the model said anything usable.
const INCOMPLETE_ANSWER: &str =
    "I was unable to complete this request within the allowed number of steps.";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// The model replied without requesting tools.
    Answered,
    /// The iteration bound was reached; the answer is best-effort.
    IterationLimit,
}

/// Result of one user turn.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub status: AgentStatus,
    /// Model invocations performed.
    pub iterations: usize,
    /// History, the new user message and every message the turn appended.
    pub messages: Vec<Message>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Cancelled")]
    Cancelled,
}

/// Bounded model ⇄ tool loop for one user turn.
///
/// Flow: user message → model → tool calls → results → model → ... → answer.
/// Tool calls within an iteration run sequentially in the order returned,
/// and every result is appended before the next model invocation.
pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn LanguageModel>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            registry,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run one user turn on behalf of `identity`.
    pub async fn run(
        &self,
        history: Vec<Message>,
        user_message: &str,
        identity: &str,
    ) -> Result<AgentOutcome, AgentError> {
        self.run_with_cancel(history, user_message, identity, &CancellationToken::new())
            .await
    }

    /// Like [`AgentLoop::run`]; cancelling the token abandons the in-flight
    /// model or tool call and returns [`AgentError::Cancelled`].
    pub async fn run_with_cancel(
        &self,
        history: Vec<Message>,
        user_message: &str,
        identity: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentError> {
        if identity.trim().is_empty() {
            return Err(AgentError::InvalidRequest("caller identity is required".to_string()));
        }
        if user_message.trim().is_empty() {
            return Err(AgentError::InvalidRequest("user message must not be empty".to_string()));
        }

        let mut state = ConversationState::new(history, user_message, identity);
        let context = ToolContext::new(identity);
        let tools = self.registry.list();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, model = self.model.name(), "Awaiting model");

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                reply = self.model.infer(state.messages(), &tools) => reply?,
            };

            let tool_calls = reply.tool_calls;
            let content = reply.content;
            state.push(Message::Assistant {
                content: content.clone(),
                tool_calls: tool_calls.clone(),
            });

            if tool_calls.is_empty() {
                info!(iteration, "Turn answered");
                return Ok(AgentOutcome {
                    answer: content,
                    status: AgentStatus::Answered,
                    iterations: iteration,
                    messages: state.into_messages(),
                });
            }

            debug!(iteration, count = tool_calls.len(), "Dispatching tool calls");
            for call in &tool_calls {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                    result = self.dispatch(call, &context) => result,
                };
                state.push(Message::Tool(result));
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Iteration limit reached without a final answer"
        );
        let answer = state
            .last_assistant_text()
            .unwrap_or(INCOMPLETE_ANSWER)
            .to_string();

        Ok(AgentOutcome {
            answer,
            status: AgentStatus::IterationLimit,
            iterations: self.max_iterations,
            messages: state.into_messages(),
        })
    }

    /// Run one tool call. Failures become error results for the model to see.
    async fn dispatch(&self, call: &ToolCall, context: &ToolContext) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model requested unknown tool");
            return ToolResult::failure(call, format!("Unknown tool: {}", call.name));
        };

        match tool.execute(&call.arguments, context).await {
            Ok(content) => ToolResult::success(call, content),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(call, format!("Tool error: {}", e))
            }
        }
    }
}
