//! OpenAI-compatible chat completions client
//!
//! Only the subset the assistant needs: plain chat turns, function tools and
//! a one-shot prompt for naming table views.

use mrec_common::config::AiConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("mrec-server/", env!("CARGO_PKG_VERSION"));

/// Longest view name we accept back from the model
pub const MAX_VIEW_NAME_CHARS: usize = 40;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Per-request overrides of the configured model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelOptions {
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Clone)]
pub struct AiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    reasoning_effort: String,
    max_tool_rounds: usize,
}

impl AiClient {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            reasoning_effort: config.reasoning_effort.clone(),
            max_tool_rounds: config.max_tool_rounds.max(1),
        })
    }

    /// Build a client when an API key is available
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiError> {
        match config.api_key() {
            Some(key) => Self::new(config, key).map(Some),
            None => {
                tracing::info!(
                    env = %config.api_key_env,
                    "No AI API key configured; assistant endpoints disabled"
                );
                Ok(None)
            }
        }
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// One chat completion turn
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
        options: &ModelOptions,
    ) -> Result<ChatMessage, AiError> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let effort = options
            .reasoning_effort
            .as_deref()
            .unwrap_or(&self.reasoning_effort);

        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        if !effort.is_empty() {
            body["reasoning_effort"] = Value::String(effort.to_string());
        }

        tracing::debug!(
            model,
            messages = messages.len(),
            tools = tools.len(),
            "Requesting chat completion"
        );

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::ApiError(status.as_u16(), error_text));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AiError::ParseError(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AiError::ParseError("response had no choices".to_string()))
    }

    /// Ask the model for a short name for a table view
    pub async fn suggest_view_name(
        &self,
        table: &str,
        description: &str,
    ) -> Result<String, AiError> {
        let messages = [
            ChatMessage::system(
                "You name saved table views. Reply with a short title of at most four words. \
                 No quotes, no punctuation at the end.",
            ),
            ChatMessage::user(format!("Table: {}\nView: {}", table, description)),
        ];

        let reply = self.complete(&messages, &[], &ModelOptions::default()).await?;
        let raw = reply.content.unwrap_or_default();
        clean_view_name(&raw).ok_or_else(|| AiError::ParseError("empty view name".to_string()))
    }
}

/// First line of a model reply, stripped of quotes and trailing punctuation
pub fn clean_view_name(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim_end_matches(&['.', '!', '?', ':'][..])
        .trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned.chars().take(MAX_VIEW_NAME_CHARS).collect::<String>().trim_end().to_string())
}

/// Name for a view when no model is available
pub fn fallback_view_name(table: &str, description: &str) -> String {
    let mut label: String = table
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    if label.is_empty() {
        label = "Records".to_string();
    }

    let detail: Vec<&str> = description.split_whitespace().take(3).collect();
    let name = if detail.is_empty() {
        format!("All {}", label)
    } else {
        format!("{}: {}", label, detail.join(" "))
    };
    name.chars().take(MAX_VIEW_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_view_name() {
        assert_eq!(clean_view_name("\"Upcoming Calls.\"\n"), Some("Upcoming Calls".to_string()));
        assert_eq!(
            clean_view_name("\n\n  Recent notes  \nextra"),
            Some("Recent notes".to_string())
        );
        assert_eq!(clean_view_name("  \n "), None);
        assert_eq!(clean_view_name(&"x".repeat(100)).map(|s| s.len()), Some(MAX_VIEW_NAME_CHARS));
    }

    #[test]
    fn test_fallback_view_name() {
        assert_eq!(fallback_view_name("calendar_events", ""), "All Calendar Events");
        assert_eq!(
            fallback_view_name("notes", "from last week about hiring"),
            "Notes: from last week"
        );
    }

    #[test]
    fn test_assistant_message_with_tool_calls_parses() {
        let raw = r#"{
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_notes", "arguments": "{}"}
            }]
        }"#;
        let message: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.content, None);
        assert_eq!(message.tool_calls[0].function.name, "get_notes");
    }

    #[test]
    fn test_tool_result_serialization() {
        let json = serde_json::to_value(ChatMessage::tool_result("call_1", "{}")).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }
}
