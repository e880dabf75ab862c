//! Client configuration

use crate::error::{ClientError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Fixed bound on a single outbound request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const ENV_BASE_URL: &str = "ASSET_API_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "ASSET_API_TIMEOUT_SECS";
const ENV_COALESCE_REFRESH: &str = "ASSET_COALESCE_REFRESH";
const ENV_TOKEN_FILE: &str = "ASSET_TOKEN_FILE";

/// Configuration for the session store and HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8080/api` (no trailing slash)
    pub base_url: String,

    /// Per-request timeout
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Share one refresh exchange between requests that fail with the same
    /// refresh token at the same time. Off means every failing request runs
    /// its own refresh.
    /// Default: false
    pub coalesce_refresh: bool,

    /// Where tokens are persisted. `None` keeps them in memory only.
    pub token_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_coalesce_refresh(mut self, coalesce: bool) -> Self {
        self.coalesce_refresh = coalesce;
        self
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Build a configuration from `ASSET_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(ENV_BASE_URL) {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        };

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Configuration(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            if secs == 0 {
                return Err(ClientError::Configuration(format!(
                    "{ENV_TIMEOUT_SECS} must be greater than zero"
                )));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_COALESCE_REFRESH) {
            config.coalesce_refresh = parse_bool(&raw).ok_or_else(|| {
                ClientError::Configuration(format!(
                    "{ENV_COALESCE_REFRESH} must be true or false, got {raw:?}"
                ))
            })?;
        }

        if let Some(path) = lookup(ENV_TOKEN_FILE) {
            if !path.trim().is_empty() {
                config.token_file = Some(PathBuf::from(path.trim()));
            }
        }

        Ok(config)
    }

    /// Join an API path onto the base URL with exactly one separator
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            coalesce_refresh: false,
            token_file: None,
        }
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
