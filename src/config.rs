use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for a Loki backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LokiConfig {
    /// Base URL of the backend, e.g. `http://localhost:3100`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum number of entries the backend returns per call. Drives the
    /// logical page size when paging through large ranges.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_base_url() -> String {
    "http://localhost:3100".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_limit() -> u32 {
    1000
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            limit: default_limit(),
        }
    }
}

impl LokiConfig {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}
