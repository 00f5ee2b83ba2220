//! HTTP error rendering
//!
//! Every failure leaves the server as `{"error": {"code", "message"}}`.
//! Ownership failures render exactly like missing records so a caller cannot
//! tell which ids exist for other users.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mrec_common::Error;
use serde_json::json;
use tracing::{error, warn};

use crate::ai::AiError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    Common(Error),
    Storage(StorageError),
    Ai(AiError),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Common(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e)
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        ApiError::Ai(e)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Common(e) => match e {
                Error::Unauthorized(_) => (
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    e.user_message().to_string(),
                ),
                Error::Forbidden(_) | Error::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", e.user_message().to_string())
                }
                Error::Validation(detail) => {
                    (StatusCode::BAD_REQUEST, "validation_failed", detail.clone())
                }
                Error::Database(_) | Error::Persistence(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_failed",
                    e.user_message().to_string(),
                ),
                Error::Io(_) | Error::Config(_) | Error::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    e.user_message().to_string(),
                ),
            },
            ApiError::Storage(e) => match e {
                StorageError::InvalidPath(_) | StorageError::InvalidBucket(_) => {
                    (StatusCode::BAD_REQUEST, "validation_failed", e.to_string())
                }
                StorageError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    "That file could not be found.".to_string(),
                ),
                StorageError::LinkExpired => (StatusCode::FORBIDDEN, "link_expired", e.to_string()),
                StorageError::InvalidSignature => {
                    (StatusCode::FORBIDDEN, "invalid_signature", e.to_string())
                }
                StorageError::Io(_) | StorageError::InvalidBaseUrl(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_failed",
                    "The file could not be stored.".to_string(),
                ),
            },
            ApiError::Ai(e) => match e {
                AiError::NotConfigured => {
                    (StatusCode::SERVICE_UNAVAILABLE, "ai_unavailable", e.to_string())
                }
                AiError::InvalidRequest(detail) => {
                    (StatusCode::BAD_REQUEST, "validation_failed", detail.clone())
                }
                AiError::NetworkError(_) | AiError::ApiError(..) | AiError::ParseError(_) => (
                    StatusCode::BAD_GATEWAY,
                    "ai_failed",
                    "The assistant is unavailable right now.".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            error!(code, error = ?self, "Request failed");
        } else {
            warn!(code, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
