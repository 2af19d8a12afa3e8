//! Connection settings for the remote storage endpoint.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:6001";

/// Environment variable overriding [`SyncConfig::base_url`].
pub const ENV_BASE_URL: &str = "RISUSAVE_URL";
/// Environment variable overriding [`SyncConfig::token_dir`].
pub const ENV_TOKEN_DIR: &str = "RISUSAVE_TOKEN_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Scheme, host and port of the storage server, no trailing slash needed.
    pub base_url: String,
    /// Directory holding the persisted auth token.  `None` keeps the token
    /// in memory only.
    #[serde(default)]
    pub token_dir: Option<PathBuf>,
    /// Per-request timeout in seconds.  Unset by default: the handshake
    /// may wait on a person and uploads may be large.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url:     DEFAULT_BASE_URL.to_string(),
            token_dir:    None,
            timeout_secs: None,
        }
    }
}

impl SyncConfig {
    /// Defaults, overridden by `RISUSAVE_URL` and `RISUSAVE_TOKEN_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(dir) = std::env::var(ENV_TOKEN_DIR) {
            if !dir.trim().is_empty() {
                config.token_dir = Some(PathBuf::from(dir));
            }
        }
        config
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Absolute URL for an API path such as `/api/read`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
