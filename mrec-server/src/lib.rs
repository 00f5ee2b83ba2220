//! mrec-server library - meeting recorder HTTP service
//!
//! Record actions for the auto-save clients, object storage with signed
//! URLs, the chat assistant and the record invalidation event stream.

use axum::Router;
use mrec_common::config::{AutosaveConfig, Config, DEFAULT_SIGNED_URL_TTL_SECS};
use mrec_common::{EventBus, SqliteRecordStore};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub mod ai;
pub mod api;
pub mod assistant;
pub mod error;
pub mod storage;
pub mod tools;

use ai::AiClient;
use storage::ObjectStorage;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<SqliteRecordStore>,
    pub events: EventBus,
    pub storage: ObjectStorage,
    /// `None` when no AI API key is configured
    pub ai: Option<AiClient>,
    pub signed_url_ttl: Duration,
    /// Timings handed to remote auto-save clients
    pub autosave: AutosaveConfig,
}

impl AppState {
    pub fn new(db: SqlitePool, storage: ObjectStorage, ai: Option<AiClient>) -> Self {
        Self {
            store: Arc::new(SqliteRecordStore::new(db.clone())),
            db,
            events: EventBus::new(256),
            storage,
            ai,
            signed_url_ttl: Duration::from_secs(DEFAULT_SIGNED_URL_TTL_SECS),
            autosave: AutosaveConfig::default(),
        }
    }

    /// State with the tunables of a loaded config file applied
    pub fn configured(
        db: SqlitePool,
        storage: ObjectStorage,
        ai: Option<AiClient>,
        config: &Config,
    ) -> Self {
        Self::new(db, storage, ai)
            .with_signed_url_ttl(Duration::from_secs(config.server.signed_url_ttl_secs))
            .with_autosave(config.autosave)
    }

    pub fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self
    }

    pub fn with_autosave(mut self, autosave: AutosaveConfig) -> Self {
        self.autosave = autosave;
        self
    }
}

/// Build application router
///
/// `/health` and signed object downloads are public; everything under
/// `/api` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/me", get(api::whoami))
        .route(
            "/api/records/:table",
            get(api::list_records).post(api::create_record),
        )
        .route(
            "/api/records/:table/:id",
            get(api::get_record)
                .patch(api::update_record)
                .delete(api::delete_record),
        )
        .route(
            "/api/storage/:bucket/upload",
            post(api::upload_object).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/storage/:bucket/sign", post(api::sign_object))
        .route("/api/storage/:bucket/remove", post(api::remove_objects))
        .route("/api/chat", post(api::chat))
        .route("/api/views/suggest-name", post(api::suggest_view_name))
        .route("/api/events", get(api::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route(
            "/storage/v1/object/sign/:bucket/*path",
            get(api::download_signed_object),
        )
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}
