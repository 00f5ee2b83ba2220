//! Filesystem object storage with signed download URLs
//!
//! Objects live at `{root}/{bucket}/{path}`. Object paths are always scoped
//! to their owner (`{user_id}/...`); a path that escapes its bucket (`..`,
//! absolute paths, empty segments) is rejected before touching the disk.
//!
//! A signed URL carries its expiry and a SHA-256 token over
//! `secret, bucket, path, expiry`:
//!
//! ```text
//! /storage/v1/object/sign/{bucket}/{path}?expires=<unix>&token=<hex>
//! ```

use mrec_common::UserId;
use reqwest::Url;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Route prefix under which signed objects are served
pub const SIGNED_URL_PREFIX: &str = "/storage/v1/object/sign";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid bucket name: {0}")]
    InvalidBucket(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Signed URL has expired")]
    LinkExpired,

    #[error("Signed URL signature does not match")]
    InvalidSignature,

    #[error("Invalid public base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A time-limited link to one object
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub path: String,
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct ObjectStorage {
    root: PathBuf,
    secret: String,
    public_base_url: String,
}

impl ObjectStorage {
    pub fn new(
        root: impl Into<PathBuf>,
        secret: String,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            secret,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Upload `bytes` for `user`, returning the stored object path
    ///
    /// A path that does not already start with the user's folder is placed
    /// inside it.
    pub async fn upload(
        &self,
        user: &UserId,
        bucket: &str,
        path: &str,
        bytes: &[u8],
    ) -> StorageResult<String> {
        let path = scope_to_user(user, path)?;
        let target = self.object_path(bucket, &path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        info!(bucket, path = %path, size = bytes.len(), "Stored object");
        Ok(path)
    }

    /// Sign a download link for an object `user` owns
    pub async fn create_signed_url(
        &self,
        user: &UserId,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> StorageResult<SignedUrl> {
        require_owner(user, path)?;
        let target = self.object_path(bucket, path)?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = mrec_common::time::unix_now().saturating_add(ttl_secs);
        let token = self.signature(bucket, path, expires_at);

        debug!(bucket, path, expires_at, "Signed object URL");

        Ok(SignedUrl {
            path: path.to_string(),
            signed_url: self.signed_link(bucket, path, expires_at, &token)?.into(),
            expires_at,
        })
    }

    /// Delete objects `user` owns; missing objects are skipped
    ///
    /// Returns the paths that were actually removed.
    pub async fn remove(
        &self,
        user: &UserId,
        bucket: &str,
        paths: &[String],
    ) -> StorageResult<Vec<String>> {
        // Validate everything first so a bad entry removes nothing
        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            require_owner(user, path)?;
            targets.push((path, self.object_path(bucket, path)?));
        }

        let mut removed = Vec::new();
        for (path, target) in targets {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => removed.push(path.clone()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(bucket, path = %path, "Object already absent");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(bucket, removed = removed.len(), "Removed objects");
        Ok(removed)
    }

    /// Verify a signed link and read the object it points to
    pub async fn read_signed(
        &self,
        bucket: &str,
        path: &str,
        expires_at: i64,
        token: &str,
    ) -> StorageResult<Vec<u8>> {
        let target = self.object_path(bucket, path)?;

        let expected = self.signature(bucket, path, expires_at);
        if !constant_time_eq(expected.as_bytes(), token.as_bytes()) {
            return Err(StorageError::InvalidSignature);
        }
        if mrec_common::time::unix_now() >= expires_at {
            return Err(StorageError::LinkExpired);
        }

        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Public download link; every path segment is percent-encoded
    fn signed_link(
        &self,
        bucket: &str,
        path: &str,
        expires_at: i64,
        token: &str,
    ) -> StorageResult<Url> {
        let invalid_base = || StorageError::InvalidBaseUrl(self.public_base_url.clone());

        let mut url = Url::parse(&self.public_base_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .extend(SIGNED_URL_PREFIX.split('/').filter(|s| !s.is_empty()))
            .push(bucket)
            .extend(path.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires_at.to_string())
            .append_pair("token", token);
        Ok(url)
    }

    fn signature(&self, bucket: &str, path: &str, expires_at: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(bucket.as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires_at.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn object_path(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        validate_bucket(bucket)?;
        validate_path(path)?;
        Ok(self.root.join(bucket).join(path))
    }
}

fn validate_bucket(bucket: &str) -> StorageResult<()> {
    let valid = !bucket.is_empty()
        && bucket.len() < 64
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidBucket(bucket.to_string()))
    }
}

fn validate_path(path: &str) -> StorageResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

fn user_prefix(user: &UserId) -> String {
    format!("{}/", user)
}

fn scope_to_user(user: &UserId, path: &str) -> StorageResult<String> {
    let path = path.trim();
    validate_path(path)?;
    if path.starts_with(&user_prefix(user)) {
        Ok(path.to_string())
    } else {
        Ok(format!("{}{}", user_prefix(user), path))
    }
}

/// Objects outside the user's folder read as missing
fn require_owner(user: &UserId, path: &str) -> StorageResult<()> {
    if path.starts_with(&user_prefix(user)) {
        Ok(())
    } else {
        Err(StorageError::NotFound(path.to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
