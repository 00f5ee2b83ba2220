//! Table view naming

use axum::{extract::State, Json};
use mrec_common::db::table_definition;
use mrec_common::Error;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ai::fallback_view_name;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SuggestNameRequest {
    pub table: String,
    /// Free text describing filters and sort order
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestNameResponse {
    pub name: String,
    /// `ai` or `fallback`
    pub source: &'static str,
}

/// POST /api/views/suggest-name
///
/// Falls back to a name built from the table and description when the AI
/// provider is missing or fails.
pub async fn suggest_view_name(
    State(state): State<AppState>,
    Json(request): Json<SuggestNameRequest>,
) -> Result<Json<SuggestNameResponse>, ApiError> {
    let table = request.table.trim();
    if table_definition(table).is_none() {
        return Err(Error::Validation(format!("unknown table '{}'", table)).into());
    }
    let description = request.description.trim();

    if let Some(ai) = &state.ai {
        match ai.suggest_view_name(table, description).await {
            Ok(name) => return Ok(Json(SuggestNameResponse { name, source: "ai" })),
            Err(e) => warn!(error = %e, "View name suggestion failed; using fallback"),
        }
    }

    Ok(Json(SuggestNameResponse {
        name: fallback_view_name(table, description),
        source: "fallback",
    }))
}
