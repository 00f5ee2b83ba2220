//! Bearer token authentication
//!
//! Protected routes require `Authorization: Bearer <token>`. The token is
//! hashed and looked up in `users`; the resolved [`UserId`] is stored as a
//! request extension for the handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use mrec_common::auth::resolve_token;
use mrec_common::config::AutosaveConfig;
use mrec_common::{Error, UserId};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Applied to protected routes only; `/health` and signed downloads do not
/// pass through it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .map(str::to_string)
        .ok_or_else(|| Error::Unauthorized("missing bearer token".to_string()))?;

    let user = resolve_token(&state.db, &token)
        .await?
        .ok_or_else(|| Error::Unauthorized("unknown token".to_string()))?;

    debug!(user_id = %user, path = %request.uri().path(), "Authenticated request");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: UserId,
    pub autosave: AutosaveConfig,
}

/// GET /api/me
///
/// Also carries the server's auto-save timings so remote clients debounce
/// the same way in-process bindings do.
pub async fn whoami(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        user_id: user,
        autosave: state.autosave,
    })
}
