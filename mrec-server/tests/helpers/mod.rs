//! Shared fixtures for the HTTP integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use mrec_common::config::{AiConfig, Config};
use mrec_common::UserId;
use mrec_server::ai::AiClient;
use mrec_server::storage::ObjectStorage;
use mrec_server::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const PUBLIC_BASE_URL: &str = "http://localhost:5730";

/// A router over an in-memory database with one signed-up user
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: SqlitePool,
    pub user: UserId,
    pub token: String,
    _storage_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None, &Config::default()).await
    }

    /// App whose state is built from a loaded config file
    pub async fn with_config(config: &Config) -> Self {
        Self::build(None, config).await
    }

    /// App whose assistant talks to an OpenAI-compatible server at `base_url`
    pub async fn with_ai(base_url: &str) -> Self {
        let config = AiConfig {
            base_url: base_url.to_string(),
            model: "test-model".to_string(),
            timeout_secs: 5,
            max_tool_rounds: 3,
            ..AiConfig::default()
        };
        let client = AiClient::new(&config, "test-key".to_string()).unwrap();
        Self::build(Some(client), &Config::default()).await
    }

    async fn build(ai: Option<AiClient>, config: &Config) -> Self {
        let db = mrec_common::db::init_memory_database().await.unwrap();
        let (user, token) = mrec_common::auth::create_user(&db, "Alice", "alice@example.com")
            .await
            .unwrap();

        let storage_dir = TempDir::new().unwrap();
        let storage = ObjectStorage::new(
            storage_dir.path(),
            "test-secret".to_string(),
            PUBLIC_BASE_URL,
        );
        let state = AppState::configured(db.clone(), storage, ai, config);

        Self {
            router: build_router(state.clone()),
            state,
            db,
            user,
            token,
            _storage_dir: storage_dir,
        }
    }

    /// Sign up another user on the same database
    pub async fn second_user(&self) -> (UserId, String) {
        mrec_common::auth::create_user(&self.db, "Bob", "bob@example.com")
            .await
            .unwrap()
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn raw_request(method: &str, uri: &str, token: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(bytes))
        .unwrap()
}

pub async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = body_bytes(body).await;
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
