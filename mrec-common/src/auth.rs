//! Acting-user resolution and API tokens
//!
//! # Architecture
//!
//! - Every mutating operation needs an acting user; `AuthProvider` answers
//!   "who is acting" and returns `None` when nobody is signed in
//! - The server authenticates requests with bearer API tokens
//! - Tokens are stored as SHA-256 hex digests in `users.token_hash`, never in clear
//! - The object storage signing secret lives in the `settings` table and is
//!   generated on first use
//!
//! No HTTP framework dependencies here; the server wraps these functions in
//! its own middleware.

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::fmt;

use crate::{Error, Result};

/// Settings key holding the object storage signing secret
pub const SIGNING_SECRET_KEY: &str = "storage_signing_secret";

/// Identity of the acting user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the acting user's identity
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is signed in
    async fn current_user(&self) -> Option<UserId>;

    /// Like `current_user`, but absence is an authorization failure
    async fn require_user(&self) -> Result<UserId> {
        self.current_user()
            .await
            .ok_or_else(|| Error::Unauthorized("no signed-in user".to_string()))
    }
}

/// Fixed identity, for in-process clients and tests
#[derive(Debug, Clone, Default)]
pub struct StaticUser(pub Option<UserId>);

impl StaticUser {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self(Some(UserId::new(id)))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl AuthProvider for StaticUser {
    async fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

// ========================================
// API tokens
// ========================================

/// Generate a random 256-bit API token as 64 hex characters
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of the token, as stored in `users.token_hash`
///
/// # Examples
///
/// ```
/// use mrec_common::auth::hash_token;
///
/// let digest = hash_token("secret-token");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_token("secret-token"));
/// ```
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a user and return its id together with a freshly issued API token
///
/// The clear-text token is only ever returned here.
pub async fn create_user(db: &SqlitePool, name: &str, email: &str) -> Result<(UserId, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("user name is required".to_string()));
    }

    let id = crate::uuid_utils::generate_record_id();
    let token = generate_api_token();

    sqlx::query(
        "INSERT INTO users (id, name, email, token_hash, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email.trim())
    .bind(hash_token(&token))
    .bind(crate::time::now_rfc3339())
    .execute(db)
    .await?;

    tracing::info!(user_id = %id, "Created user");
    Ok((UserId(id), token))
}

/// Resolve a bearer token to its user
///
/// Returns `Ok(None)` for unknown tokens.
pub async fn resolve_token(db: &SqlitePool, token: &str) -> Result<Option<UserId>> {
    if token.is_empty() {
        return Ok(None);
    }

    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE token_hash = ?")
        .bind(hash_token(token))
        .fetch_optional(db)
        .await?;

    Ok(row.map(|(id,)| UserId(id)))
}

// ========================================
// Storage signing secret
// ========================================

/// Load the object storage signing secret, generating it on first use
pub async fn load_signing_secret(db: &SqlitePool) -> Result<String> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(SIGNING_SECRET_KEY)
        .fetch_optional(db)
        .await?;

    match existing {
        Some((value,)) if !value.is_empty() => Ok(value),
        _ => initialize_signing_secret(db).await,
    }
}

/// Generate and store a new signing secret
///
/// Rotating the secret invalidates every outstanding signed URL.
pub async fn initialize_signing_secret(db: &SqlitePool) -> Result<String> {
    let secret = generate_api_token();

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SIGNING_SECRET_KEY)
        .bind(&secret)
        .execute(db)
        .await?;

    tracing::info!("Initialized storage signing secret");
    Ok(secret)
}
