//! OpenAI-compatible chat completions client with tool calling.
//!
//! Works against any `/chat/completions` endpoint that accepts the
//! `tools` / `tool_calls` extension (OpenAI, Groq, vLLM, llama.cpp server).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use folio_core::AgentConfig;

use crate::conversation::{Message, ToolCall};
use crate::provider::{AssistantReply, LanguageModel, ModelError};
use crate::tool::ToolDefinition;

pub struct OpenAiModel {
    http: HttpClient,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    temperature: f32,
    system_prompt: Option<String>,
}

impl OpenAiModel {
    /// Build a client from configuration, reading the API key from the
    /// configured environment variable. A missing key only fails at inference.
    pub fn from_config(config: &AgentConfig) -> Result<Self, ModelError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()),
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        })
    }

    /// Override the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> ApiRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            api_messages.push(ApiMessage {
                role: "system",
                content: Some(prompt.clone()),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        api_messages.extend(messages.iter().map(to_api_message));

        let api_tools: Vec<ApiTool> = tools
            .iter()
            .map(|t| ApiTool {
                kind: "function",
                function: ApiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();

        ApiRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: api_messages,
            tool_choice: (!api_tools.is_empty()).then_some("auto"),
            tools: api_tools,
        }
    }
}

fn to_api_message(message: &Message) -> ApiMessage {
    match message {
        Message::User { content } => ApiMessage {
            role: "user",
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::Assistant { content, tool_calls } => ApiMessage {
            role: "assistant",
            // Some providers reject an empty string next to tool calls.
            content: if content.is_empty() && !tool_calls.is_empty() {
                None
            } else {
                Some(content.clone())
            },
            tool_calls: (!tool_calls.is_empty()).then(|| {
                tool_calls
                    .iter()
                    .map(|c| ApiToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: ApiFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: None,
        },
        Message::Tool(result) => ApiMessage {
            role: "tool",
            content: Some(result.content.clone()),
            tool_calls: None,
            tool_call_id: Some(result.call_id.clone()),
        },
    }
}

fn parse_reply(bytes: &[u8]) -> Result<AssistantReply, ModelError> {
    let parsed: ApiResponse =
        serde_json::from_slice(bytes).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".to_string()))?;

    Ok(AssistantReply {
        content: message.content.unwrap_or_default(),
        tool_calls: message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect(),
    })
}

fn status_error(status: StatusCode, body: &[u8]) -> ModelError {
    let message = serde_json::from_slice::<ApiErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited(message),
        _ => ModelError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn infer(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<AssistantReply, ModelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::MissingApiKey(self.api_key_env.clone()))?;

        let request = self.build_request(messages, tools);
        debug!(model = %self.model, messages = request.messages.len(), "Sending chat completion");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        parse_reply(&bytes)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    temperature: f32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolResult;

    fn model(system_prompt: Option<&str>) -> OpenAiModel {
        let config = AgentConfig {
            base_url: "http://localhost:9/v1/".to_string(),
            api_key_env: "FOLIO_TEST_UNSET_KEY".to_string(),
            system_prompt: system_prompt.map(String::from),
            ..AgentConfig::default()
        };
        OpenAiModel::from_config(&config).unwrap()
    }

    fn search_tool() -> ToolDefinition {
        ToolDefinition {
            name: "search_web".to_string(),
            description: "Search the internet".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_endpoint_trims_slash() {
        assert_eq!(model(None).endpoint(), "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn test_request_shape() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "search_web".to_string(),
            arguments: r#"{"query":"melville"}"#.to_string(),
        };
        let messages = vec![
            Message::user("Who wrote Moby-Dick?"),
            Message::Assistant {
                content: String::new(),
                tool_calls: vec![call.clone()],
            },
            Message::Tool(ToolResult::success(&call, "Herman Melville")),
        ];

        let request = model(Some("Be brief.")).build_request(&messages, &[search_tool()]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "search_web");

        let sent = json["messages"].as_array().unwrap();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0]["role"], "system");
        assert_eq!(sent[1]["content"], "Who wrote Moby-Dick?");
        assert!(sent[2]["content"].is_null());
        assert_eq!(sent[2]["tool_calls"][0]["function"]["arguments"], r#"{"query":"melville"}"#);
        assert_eq!(sent[3]["role"], "tool");
        assert_eq!(sent[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_without_tools() {
        let request = model(None).build_request(&[Message::user("hi")], &[]);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_tool_call_reply() {
        let body = br#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "search_documents", "arguments": "{\"query\":\"whale\"}"}
                    }]
                }
            }]
        }"#;
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "search_documents");
        assert_eq!(reply.tool_calls[0].arguments, r#"{"query":"whale"}"#);
    }

    #[test]
    fn test_parse_text_reply() {
        let body = br#"{"choices": [{"message": {"role": "assistant", "content": "Hello"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), AssistantReply::text("Hello"));
    }

    #[test]
    fn test_parse_empty_choices() {
        let err = parse_reply(br#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn test_status_mapping() {
        let body = br#"{"error": {"message": "bad key"}}"#;
        assert!(matches!(status_error(StatusCode::UNAUTHORIZED, body), ModelError::Auth(m) if m == "bad key"));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, body), ModelError::RateLimited(_)));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, b"upstream down"),
            ModelError::Api { status: 502, message } if message == "upstream down"
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let err = model(None).infer(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey(env) if env == "FOLIO_TEST_UNSET_KEY"));
    }
}
