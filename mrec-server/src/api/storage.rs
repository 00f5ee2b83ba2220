//! Object storage actions and signed downloads

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use mrec_common::UserId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;
use crate::storage::SignedUrl;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: String,
}

/// POST /api/storage/:bucket/upload?path=
pub async fn upload_object(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path(bucket): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let path = state
        .storage
        .upload(&user, &bucket, &query.path, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { path })))
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub path: String,
    /// Seconds; defaults to the configured TTL
    #[serde(default, rename = "expiresIn")]
    pub expires_in: Option<u64>,
}

/// POST /api/storage/:bucket/sign
pub async fn sign_object(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path(bucket): Path<String>,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignedUrl>, ApiError> {
    let ttl = request
        .expires_in
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(state.signed_url_ttl);

    let signed = state
        .storage
        .create_signed_url(&user, &bucket, request.path.trim(), ttl)
        .await?;
    Ok(Json(signed))
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: Vec<String>,
}

/// POST /api/storage/:bucket/remove
pub async fn remove_objects(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path(bucket): Path<String>,
    Json(request): Json<RemoveRequest>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let paths: Vec<String> = request
        .paths
        .iter()
        .map(|p| p.trim().to_string())
        .collect();
    let removed = state.storage.remove(&user, &bucket, &paths).await?;
    Ok(Json(RemoveResponse { removed }))
}

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub token: String,
}

/// GET /storage/v1/object/sign/:bucket/*path?expires=&token=
///
/// Public: the signature is the authorization.
pub async fn download_signed_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    let bytes = state
        .storage
        .read_signed(&bucket, &path, query.expires, &query.token)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
