//! Transport configuration.
//!
//! A [`TransportConfig`] is built by the caller (or read from a JSON file)
//! and handed to [`HttpTransport::new`](crate::HttpTransport::new). There is
//! no process-wide state: two connections with different configs never
//! influence each other.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use sqlbridge_protocol::constants::DEFAULT_TIMEOUT_MS;

/// Credentials attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Credentials {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
}

/// Outbound HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
        }
    }

    pub(crate) fn to_reqwest(&self) -> Result<reqwest::Proxy, TransportError> {
        let mut proxy = reqwest::Proxy::all(&self.uri)
            .map_err(|e| TransportError::InvalidConfig(format!("proxy {}: {e}", self.uri)))?;
        if let Some(username) = &self.username {
            proxy = proxy.basic_auth(username, self.password.as_deref().unwrap_or_default());
        }
        Ok(proxy)
    }
}

/// Connection-scoped transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Endpoint that operation names are appended to.
    pub base_url: String,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    /// Per-request timeout. `0` leaves the transport default in place.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_user_agent() -> String {
    format!("sqlbridge/{}", env!("CARGO_PKG_VERSION"))
}

impl TransportConfig {
    /// Creates a config with no credentials, no proxy and the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::None,
            proxy: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self, TransportError> {
        let content = std::fs::read_to_string(path)?;
        let config: TransportConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "transport config loaded");
        Ok(config)
    }

    /// Checks that the base URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), TransportError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            TransportError::InvalidConfig(format!("base URL {:?}: {e}", self.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(TransportError::InvalidConfig(format!(
                "unsupported URL scheme: {other}"
            ))),
        }
    }

    /// Returns the explicit timeout, or `None` when the transport default applies.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// URL for a named operation: `<base>/<operation>`.
    pub fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), operation)
    }

    /// URL that blob uploads are posted to.
    pub fn upload_url(&self) -> &str {
        &self.base_url
    }
}
