//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::channels::{ChannelBlock, ChatConfig};
use super::defaults::default_channel_id;
use super::sync::SyncConfig;
use crate::sync::Role;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Channel players land in when they have none.
    #[serde(default = "default_channel_id")]
    pub default_channel: String,
    /// Process identity and role.
    pub server: ServerConfig,
    /// Status sync link settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Channel definitions.
    #[serde(default)]
    pub channels: Vec<ChannelBlock>,
    /// Chat formatting and restrictions.
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Process identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name this process goes by on links and in envelopes
    /// (e.g. "proxy", "survival").
    pub name: String,
    /// Which end of the topology this process is.
    pub role: Role,
}
