//! Remote row-store transport.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::util::{compact_text, normalize_text_option};

/// Transport to the remote row store.
///
/// The merge engine only needs these three verbs; keeping them behind a trait
/// lets tests drive full cycles against an in-memory double.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Rows of `kind` whose server-side `updated_at` is strictly greater
    /// than `since_ms`, tombstones included.
    async fn fetch_since(&self, kind: EntityKind, since_ms: i64) -> Result<Vec<Value>>;

    /// Insert or replace a single row keyed by its id.
    async fn push_row(&self, kind: EntityKind, row: &Value) -> Result<()>;

    /// Hard delete by id. Administrative purge only; the sync cycle never
    /// calls this.
    async fn delete_row(&self, kind: EntityKind, id: Uuid) -> Result<()>;
}

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the hosted row store.
///
/// Tables are collections under the base URL; filters use the backend's
/// `column=op.value` query dialect. Auth is a static bearer credential next
/// to an api-key header; there is no per-user remote auth.
#[derive(Clone)]
pub struct RestRemote {
    base_url: String,
    client: reqwest::Client,
}

impl RestRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config.normalized_base_url().ok_or_else(|| {
            Error::InvalidInput("remote base URL must include http:// or https://".to_string())
        })?;
        let api_key = normalize_text_option(config.api_key.clone())
            .ok_or_else(|| Error::InvalidInput("remote API key must not be empty".to_string()))?;
        let bearer_token = normalize_text_option(config.bearer_token.clone()).ok_or_else(|| {
            Error::InvalidInput("remote bearer token must not be empty".to_string())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&api_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {bearer_token}"))?);

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self { base_url, client })
    }
}

impl RemoteStore for RestRemote {
    async fn fetch_since(&self, kind: EntityKind, since_ms: i64) -> Result<Vec<Value>> {
        let url = format!(
            "{}/{}?select=*&updated_at=gt.{since_ms}",
            self.base_url,
            kind.table_name()
        );

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(parse_api_error(status, &body)));
        }

        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn push_row(&self, kind: EntityKind, row: &Value) -> Result<()> {
        let url = format!("{}/{}", self.base_url, kind.table_name());

        let response = self
            .client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates")
            .json(std::slice::from_ref(row))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(parse_api_error(status, &body)));
        }

        Ok(())
    }

    async fn delete_row(&self, kind: EntityKind, id: Uuid) -> Result<()> {
        let url = format!("{}/{}?id=eq.{id}", self.base_url, kind.table_name());

        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(parse_api_error(status, &body)));
        }

        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidInput("remote credential contains invalid characters".into()))
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
