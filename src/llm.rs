//! Chat-completion client abstraction and provider implementations.
//!
//! The whole pipeline talks to one trait, `ChatModel`. Both supported
//! providers (OpenAI, and Gemini through its OpenAI-compatible endpoint)
//! share the same wire format, so a single HTTP client covers them and the
//! provider switch reduces to a base URL + key + default model.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, Role, ToolCall, Usage};

/// Function schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides whether to call tools.
    Auto,
    /// Tool calling disabled; forces a plain-text reply.
    None,
}

impl ToolChoice {
    fn as_str(self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// Result of one chat-completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_choice: ToolChoice,
    ) -> Result<Completion>;
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return AgentError::Auth(format!("{provider} rejected the API key: {body}"));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::Provider(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::Provider(format!("{provider} request failed with {status}: {body}"))
}

/// HTTP client for OpenAI-compatible chat-completion endpoints.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    provider_label: String,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .map_err(|err| AgentError::Provider(format!("http client error: {err}")))?,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            provider_label: "model provider".into(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let mut client = Self::new(cfg.provider.base_url(), &cfg.api_key, &cfg.model)?;
        client.provider_label = format!("{:?}", cfg.provider).to_lowercase();
        Ok(client)
    }

    fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let mut wire = json!({ "role": role, "content": message.content });
                if !message.tool_calls.is_empty() {
                    wire["tool_calls"] = Value::Array(
                        message
                            .tool_calls
                            .iter()
                            .map(|call| {
                                json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": serde_json::to_string(&call.arguments)
                                            .unwrap_or_else(|_| call.arguments.to_string()),
                                    }
                                })
                            })
                            .collect(),
                    );
                    wire["content"] = Value::Null;
                }
                if let Some(id) = &message.tool_call_id {
                    wire["tool_call_id"] = json!(id);
                }
                if let Some(name) = &message.name {
                    wire["name"] = json!(name);
                }
                wire
            })
            .collect()
    }

    fn to_wire_tools(tools: &[ToolSchema]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_choice: ToolChoice,
    ) -> Result<Completion> {
        let mut payload = json!({
            "model": self.model,
            "messages": Self::to_wire_messages(messages),
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(Self::to_wire_tools(tools));
            payload["tool_choice"] = json!(tool_choice.as_str());
        }

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                AgentError::Provider(format!("{} request error: {err}", self.provider_label))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, &self.provider_label));
        }

        let body: WireResponse = resp.json().await.map_err(|err| {
            AgentError::Provider(format!("{} response parse error: {err}", self.provider_label))
        })?;

        let first = body.choices.into_iter().next().ok_or_else(|| {
            AgentError::Provider(format!("{} returned no choices", self.provider_label))
        })?;

        Ok(Completion {
            content: first.message.content,
            tool_calls: first
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(WireToolCall::into_tool_call)
                .collect(),
            usage: body.usage.unwrap_or_default(),
        })
    }
}

/// Deterministic scripted model for tests. Pops one completion per call and
/// errors when the script runs out, which doubles as an assertion that no
/// unexpected model calls happen.
pub struct StubModel {
    script: Mutex<VecDeque<Completion>>,
}

impl StubModel {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    /// A model whose every call fails, for exercising fallback paths.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolSchema],
        _tool_choice: ToolChoice,
    ) -> Result<Completion> {
        let mut locked = self.script.lock().expect("stub model poisoned");
        locked
            .pop_front()
            .ok_or_else(|| AgentError::Provider("StubModel ran out of scripted responses".into()))
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

impl WireToolCall {
    fn into_tool_call(self) -> ToolCall {
        // Providers encode arguments as a JSON string; tolerate junk by
        // falling back to the raw text so the executor can report it.
        let arguments = serde_json::from_str(&self.function.arguments)
            .unwrap_or_else(|_| Value::String(self.function.arguments.clone()));
        ToolCall {
            id: self
                .id
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
            name: self.function.name,
            arguments,
        }
    }
}
