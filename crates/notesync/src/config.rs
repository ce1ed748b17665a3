//! Connection settings for the hosted backend.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENDPOINT_ENV: &str = "NOTESYNC_ENDPOINT";
pub const ATTACHMENTS_URL_ENV: &str = "NOTESYNC_ATTACHMENTS_URL";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EVENT_BUFFER: usize = 1000;

/// Backend connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// GraphQL endpoint of the generated API
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Transport timeout applied to every remote call
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Base URL of the attachment bucket
    #[serde(default)]
    pub attachments_url: Option<String>,

    /// Capacity of the store and auth event channels
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            attachments_url: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SyncConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
        })?;

        Self::from_yaml_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML {}: {}", path.display(), e))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Override file values with `NOTESYNC_*` environment variables.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(url) = lookup(ATTACHMENTS_URL_ENV).filter(|v| !v.is_empty()) {
            self.attachments_url = Some(url);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The endpoint, or an error naming how to provide one.
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No GraphQL endpoint configured (set `endpoint` in the config file or {})",
                ENDPOINT_ENV
            )
        })
    }
}
