//! HTTP client for the PostgREST/Supabase API.
//!
//! Table access goes through `/rest/v1`, photo objects through `/storage/v1`
//! and identity lookup through `/auth/v1`. Every request carries the public
//! `apikey` header and a bearer token (the session token when signed in, the
//! public key otherwise). Uses reqwest with JSON serialization.

use crate::config::CloudConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::remote::{ObjectStorage, RemoteStore};
use crate::types::{ApiErrorBody, Filter, RemoteUser};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Postgres unique_violation.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// PostgREST "no rows" for single-object requests.
const PGRST_NO_ROWS: &str = "PGRST116";

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// HTTP client for the hosted backend.
pub struct RestClient {
    client: Client,
    config: CloudConfig,
    access_token: Arc<RwLock<Option<String>>>,
}

impl RestClient {
    pub fn new(config: CloudConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Config(format!("failed to build HTTP client: {e}")))?;

        let access_token = config.access_token.clone();
        Ok(Self {
            client,
            config,
            access_token: Arc::new(RwLock::new(access_token)),
        })
    }

    /// Sets the session token (for restoring a saved session).
    pub async fn set_access_token(&self, token: String) {
        *self.access_token.write().await = Some(token);
    }

    pub async fn clear_access_token(&self) {
        *self.access_token.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url(), table)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url(), bucket, path)
    }

    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.config.anon_key.clone());

        self.client
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        let resp = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                RemoteError::Network(e.to_string())
            } else {
                RemoteError::Http(e)
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        debug!("request failed with {status}: {body}");
        Err(classify(status, &body))
    }

    async fn rows(resp: Response) -> RemoteResult<Vec<Value>> {
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }
}

/// Maps an error response onto the remote error taxonomy.
pub(crate) fn classify(status: StatusCode, body: &str) -> RemoteError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match parsed.code.as_deref() {
        Some(PG_UNIQUE_VIOLATION) => return RemoteError::UniqueViolation(message),
        Some(PGRST_NO_ROWS) => return RemoteError::NotFound(message),
        _ => {}
    }

    match status {
        StatusCode::CONFLICT if parsed.code.is_none() => RemoteError::UniqueViolation(message),
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        s if s.is_server_error() => RemoteError::Server {
            status: s.as_u16(),
            message,
        },
        s => RemoteError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

fn id_query(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait]
impl RemoteStore for RestClient {
    async fn select(&self, table: &str, filters: &[Filter]) -> RemoteResult<Vec<Value>> {
        let mut query: Vec<(String, String)> = vec![("select".into(), "*".into())];
        query.extend(
            filters
                .iter()
                .map(|f| (f.column.clone(), format!("eq.{}", f.value))),
        );

        let builder = self
            .request(Method::GET, &self.table_url(table))
            .await
            .query(&query);
        let resp = self.send(builder).await?;
        Self::rows(resp).await
    }

    async fn insert(&self, table: &str, row: &Value) -> RemoteResult<Value> {
        let builder = self
            .request(Method::POST, &self.table_url(table))
            .await
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row);
        let resp = self.send(builder).await?;
        let rows = Self::rows(resp).await?;
        Ok(rows.into_iter().next().unwrap_or_else(|| row.clone()))
    }

    async fn upsert(&self, table: &str, row: &Value) -> RemoteResult<Value> {
        let builder = self
            .request(Method::POST, &self.table_url(table))
            .await
            .query(&[("on_conflict", "id")])
            .header("Prefer", MERGE_DUPLICATES)
            .json(row);
        let resp = self.send(builder).await?;
        let rows = Self::rows(resp).await?;
        Ok(rows.into_iter().next().unwrap_or_else(|| row.clone()))
    }

    async fn update(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<Value> {
        let builder = self
            .request(Method::PATCH, &self.table_url(table))
            .await
            .query(&id_query(id))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        let resp = self.send(builder).await?;
        Self::rows(resp)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(format!("{table}/{id}")))
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        let builder = self
            .request(Method::DELETE, &self.table_url(table))
            .await
            .query(&id_query(id))
            .header("Prefer", RETURN_REPRESENTATION);
        let resp = self.send(builder).await?;
        if Self::rows(resp).await?.is_empty() {
            return Err(RemoteError::NotFound(format!("{table}/{id}")));
        }
        Ok(())
    }

    async fn current_user(&self) -> RemoteResult<RemoteUser> {
        if !self.is_authenticated().await {
            return Err(RemoteError::AuthRequired);
        }
        let url = format!("{}/auth/v1/user", self.base_url());
        let resp = self.send(self.request(Method::GET, &url).await).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ObjectStorage for RestClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RemoteResult<()> {
        let size = bytes.len();
        let builder = self
            .request(Method::POST, &self.object_url(bucket, path))
            .await
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes);
        self.send(builder).await?;
        debug!("uploaded {bucket}/{path} ({size} bytes)");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url(),
            bucket,
            path
        )
    }

    async fn remove(&self, bucket: &str, path: &str) -> RemoteResult<()> {
        let builder = self
            .request(Method::DELETE, &self.object_url(bucket, path))
            .await;
        self.send(builder).await?;
        Ok(())
    }
}
