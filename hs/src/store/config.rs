//! Store configuration and session credentials

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Channel buffer size for store requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        debug!("StoreConfig::default: called");
        Self {
            channel_buffer: default_channel_buffer(),
        }
    }
}

/// Opaque inputs needed to join a shared session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    #[serde(rename = "api-key")]
    pub api_key: String,
    #[serde(rename = "app-id")]
    pub app_id: String,
}

impl SessionCredentials {
    pub fn new(api_key: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_id: app_id.into(),
        }
    }

    /// Both values must be present; their content is not interpreted
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(SyncError::InvalidCredentials("api key is empty".to_string()));
        }
        if self.app_id.trim().is_empty() {
            return Err(SyncError::InvalidCredentials("app id is empty".to_string()));
        }
        Ok(())
    }
}
