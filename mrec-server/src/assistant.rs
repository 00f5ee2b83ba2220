//! Chat assistant: a bounded tool-calling loop over the note tools

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::{AiClient, AiError, ChatMessage, ModelOptions};
use crate::tools::{self, NoteTools, ToolResult};

const SYSTEM_PROMPT: &str = "You are the assistant inside a meeting recorder. You can read and \
edit the user's notes with the provided tools. Keep answers short. Never invent note ids; look \
them up with get_notes first.";

/// One tool call the assistant made while answering
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub result: ToolResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub message: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Answer `message`, letting the model call note tools for up to
/// `max_tool_rounds` rounds
///
/// When the model still wants tools after the last round, one final turn
/// without tools forces a plain answer.
pub async fn run_chat(
    ai: &AiClient,
    note_tools: &NoteTools<'_>,
    message: &str,
    options: &ModelOptions,
) -> Result<ChatOutcome, AiError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AiError::InvalidRequest("message is required".to_string()));
    }

    let definitions = tools::definitions();
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(message)];
    let mut invocations = Vec::new();

    for round in 1..=ai.max_tool_rounds() {
        let reply = ai.complete(&messages, &definitions, options).await?;

        if reply.tool_calls.is_empty() {
            info!(rounds = round, tools = invocations.len(), "Assistant answered");
            return Ok(ChatOutcome {
                message: reply.content.unwrap_or_default(),
                tool_calls: invocations,
            });
        }

        debug!(round, calls = reply.tool_calls.len(), "Assistant requested tools");
        let calls = reply.tool_calls.clone();
        messages.push(reply);

        for call in calls {
            let result = note_tools
                .execute(&call.function.name, &call.function.arguments)
                .await;
            messages.push(ChatMessage::tool_result(&call.id, result.to_json_string()));
            invocations.push(ToolInvocation {
                name: call.function.name,
                result,
            });
        }
    }

    warn!(
        max_rounds = ai.max_tool_rounds(),
        "Tool round limit reached; asking for a final answer"
    );
    let reply = ai.complete(&messages, &[], options).await?;
    Ok(ChatOutcome {
        message: reply.content.unwrap_or_default(),
        tool_calls: invocations,
    })
}
