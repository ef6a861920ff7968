//! Status sync link configuration.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::defaults::{default_max_frame_len, default_queue_capacity, default_sync_channel};

/// `[sync]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Logical channel status envelopes travel on.
    #[serde(default = "default_sync_channel")]
    pub channel: String,
    /// Address the proxy accepts backend links on.
    pub listen: Option<SocketAddr>,
    /// Proxy address a backend dials (host:port).
    pub proxy_addr: Option<String>,
    /// Outbound frames buffered per link before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds between proxy-initiated resyncs. Unset disables resync.
    pub resync_interval_secs: Option<u64>,
    /// Longest accepted frame in bytes.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    /// Backend names the proxy accepts links from. Unset accepts any.
    pub allowed_backends: Option<Vec<String>>,
}

impl SyncConfig {
    pub fn resync_interval(&self) -> Option<Duration> {
        self.resync_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel: default_sync_channel(),
            listen: None,
            proxy_addr: None,
            queue_capacity: default_queue_capacity(),
            resync_interval_secs: None,
            max_frame_len: default_max_frame_len(),
            allowed_backends: None,
        }
    }
}
