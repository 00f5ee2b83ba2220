//! Chat assistant endpoint

use axum::{extract::State, Extension, Json};
use mrec_common::UserId;
use serde::Deserialize;

use crate::ai::{AiError, ModelOptions};
use crate::assistant::{run_chat, ChatOutcome};
use crate::error::ApiError;
use crate::tools::NoteTools;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(flatten)]
    pub options: ModelOptions,
}

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let ai = state.ai.as_ref().ok_or(AiError::NotConfigured)?;
    let note_tools = NoteTools::new(state.store.as_ref(), &state.events, &user);

    let outcome = run_chat(ai, &note_tools, &request.message, &request.options).await?;
    Ok(Json(outcome))
}
