//! Record store client for the meeting recorder server
//!
//! Lets bindings run in a process that does not own the database. Every
//! request carries the bearer token; the server scopes each call to the
//! token's user, so a filter naming any other user is rejected locally.

use async_trait::async_trait;
use mrec_common::config::AutosaveConfig;
use mrec_common::store::{Record, RecordFilter, RecordStore};
use mrec_common::{AuthProvider, Error, Result, UserId};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("mrec-autosave/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {status}: {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<RemoteStoreError> for Error {
    fn from(e: RemoteStoreError) -> Self {
        match e {
            RemoteStoreError::ApiError {
                status, message, ..
            } => match status {
                400 => Error::Validation(message),
                401 => Error::Unauthorized(message),
                403 => Error::Forbidden(message),
                404 => Error::NotFound(message),
                _ => Error::Persistence(message),
            },
            other => Error::Persistence(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ColumnUpdate<'a> {
    column: &'a str,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    records: Vec<Record>,
    total: i64,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    user_id: UserId,
    #[serde(default)]
    autosave: AutosaveConfig,
}

/// `RecordStore` backed by the server's record actions
pub struct HttpRecordStore {
    http_client: reqwest::Client,
    base_url: Url,
    token: String,
    user_id: UserId,
    autosave: AutosaveConfig,
}

impl HttpRecordStore {
    /// Connect, resolve the token's user and fetch the server's auto-save timings
    pub async fn connect(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteStoreError::NetworkError(e.to_string()))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid server URL '{}': {}", base_url, e)))?;
        let token = token.into();

        let response = http_client
            .get(endpoint(&base_url, &["api", "me"])?)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| RemoteStoreError::NetworkError(e.to_string()))?;
        let whoami: WhoAmI = decode(response).await?;

        tracing::info!(
            base_url = %base_url,
            user_id = %whoami.user_id,
            "Connected to record server"
        );

        Ok(Self {
            http_client,
            base_url,
            token,
            user_id: whoami.user_id,
            autosave: whoami.autosave,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Timings the server is configured with; see `BindingBuilder::timings`
    pub fn autosave_config(&self) -> &AutosaveConfig {
        &self.autosave
    }

    fn url(&self, table: &str, id: Option<&str>) -> Result<Url> {
        match id {
            Some(id) => endpoint(&self.base_url, &["api", "records", table, id]),
            None => endpoint(&self.base_url, &["api", "records", table]),
        }
    }

    fn check_owner(&self, user_id: &UserId) -> Result<()> {
        if user_id == &self.user_id {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "token belongs to {}, not {}",
                self.user_id, user_id
            )))
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| RemoteStoreError::NetworkError(e.to_string()))?;
        Ok(response)
    }

    async fn fetch_page(
        &self,
        table: &str,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> Result<RecordPage> {
        self.check_owner(user_id)?;
        let request = self
            .http_client
            .get(self.url(table, None)?)
            .query(&[("limit", limit), ("offset", offset)]);
        decode(self.send(request).await?).await
    }
}

/// `base` with each segment appended, percent-encoded
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a response into `T`, or its error body into an error
async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        return Err(api_error(status, response).await.into());
    }

    let parsed = response
        .json()
        .await
        .map_err(|e| RemoteStoreError::ParseError(e.to_string()))?;
    Ok(parsed)
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> RemoteStoreError {
    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => ("unknown".to_string(), text),
    };

    tracing::debug!(status = status.as_u16(), code = %code, "Record server returned error");

    RemoteStoreError::ApiError {
        status: status.as_u16(),
        code,
        message,
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create(&self, table: &str, payload: Record) -> Result<Record> {
        if let Some(owner) = payload.get(mrec_common::db::USER_COLUMN).and_then(Value::as_str) {
            self.check_owner(&UserId::new(owner))?;
        }
        let request = self.http_client.post(self.url(table, None)?).json(&payload);
        decode(self.send(request).await?).await
    }

    async fn update(
        &self,
        table: &str,
        column: &str,
        value: Value,
        filter: &RecordFilter,
    ) -> Result<Record> {
        self.check_owner(&filter.user_id)?;
        let request = self
            .http_client
            .patch(self.url(table, Some(&filter.id))?)
            .json(&ColumnUpdate { column, value });
        decode(self.send(request).await?).await
    }

    async fn delete(&self, table: &str, filter: &RecordFilter) -> Result<()> {
        self.check_owner(&filter.user_id)?;
        let request = self.http_client.delete(self.url(table, Some(&filter.id))?);
        let response = self.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await.into());
        }
        Ok(())
    }

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Record> {
        self.check_owner(&filter.user_id)?;
        let request = self.http_client.get(self.url(table, Some(&filter.id))?);
        decode(self.send(request).await?).await
    }

    async fn list(
        &self,
        table: &str,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Record>> {
        Ok(self.fetch_page(table, user_id, limit, offset).await?.records)
    }

    async fn count(&self, table: &str, user_id: &UserId) -> Result<i64> {
        Ok(self.fetch_page(table, user_id, 1, 0).await?.total)
    }
}

/// The token's user is the acting user
#[async_trait]
impl AuthProvider for HttpRecordStore {
    async fn current_user(&self) -> Option<UserId> {
        Some(self.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_map_to_error_kinds() {
        let api = |status| RemoteStoreError::ApiError {
            status,
            code: "x".to_string(),
            message: "m".to_string(),
        };

        assert!(matches!(Error::from(api(400)), Error::Validation(_)));
        assert!(matches!(Error::from(api(401)), Error::Unauthorized(_)));
        assert!(matches!(Error::from(api(404)), Error::NotFound(_)));
        assert!(matches!(Error::from(api(500)), Error::Persistence(_)));
        assert!(matches!(
            Error::from(RemoteStoreError::NetworkError("refused".to_string())),
            Error::Persistence(_)
        ));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("http://127.0.0.1:5730/").unwrap();

        let url = endpoint(&base, &["api", "records", "notes", "a/b#c?d"]).unwrap();

        assert_eq!(url.path(), "/api/records/notes/a%2Fb%23c%3Fd");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let base = Url::parse("https://example.com/mrec/").unwrap();

        let url = endpoint(&base, &["api", "me"]).unwrap();

        assert_eq!(url.as_str(), "https://example.com/mrec/api/me");
    }
}
