//! Process-wide configuration snapshots.
//!
//! Settings are read from the config table once per process into an immutable
//! `AppConfig` that is passed explicitly to the sync, import, and messaging
//! components. Mutations go through `ConfigRepository` and produce a fresh
//! snapshot; nothing reads the table ad hoc mid-flight.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};

/// Default per-table budget for remote pull/push operations.
pub const DEFAULT_TABLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shop identity and messaging settings persisted in the config table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Base URL for customer-facing tracking links. May legitimately hold a
    /// development address; the sanitizer substitutes the public base then.
    #[serde(default)]
    pub tracking_base_url: Option<String>,
}

impl AppConfig {
    /// Tracking base with whitespace/empties normalized away.
    #[must_use]
    pub fn tracking_base(&self) -> Option<String> {
        normalize_text_option(self.tracking_base_url.clone())
    }
}

/// Connection settings for the remote row store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Backend base URL (e.g. `https://project.example.co/rest/v1`)
    pub base_url: Option<String>,
    /// API key header value
    pub api_key: Option<String>,
    /// Static bearer credential
    pub bearer_token: Option<String>,
}

impl RemoteConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            bearer_token: Some(bearer_token.into()),
        }
    }

    /// Check if the remote backend is fully configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.normalized_base_url().is_some()
            && normalize_text_option(self.api_key.clone()).is_some()
            && normalize_text_option(self.bearer_token.clone()).is_some()
    }

    /// Base URL trimmed, validated as http(s), without a trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> Option<String> {
        let url = normalize_text_option(self.base_url.clone())?;
        if is_http_url(&url) {
            Some(url.trim_end_matches('/').to_string())
        } else {
            None
        }
    }
}
