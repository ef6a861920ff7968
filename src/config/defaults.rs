//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use chatlink_proto::STATUS_CHANNEL;

// =============================================================================
// Sync Defaults
// =============================================================================

pub fn default_sync_channel() -> String {
    STATUS_CHANNEL.to_string()
}

pub fn default_queue_capacity() -> usize {
    1024
}

pub fn default_max_frame_len() -> usize {
    chatlink_proto::line::DEFAULT_MAX_LINE_LEN
}

// =============================================================================
// Channel Defaults
// =============================================================================

pub fn default_channel_id() -> String {
    "global".to_string()
}

// =============================================================================
// Chat Defaults
// =============================================================================

pub fn default_chat_format() -> String {
    "[{channel}] {player}: {message}".to_string()
}

pub fn default_private_format() -> String {
    "[{player} -> {recipient}] {message}".to_string()
}

pub fn default_broadcast_format() -> String {
    "[Broadcast] {message}".to_string()
}

pub fn default_bypass_permission() -> String {
    "chatlink.bypass.restrictions".to_string()
}
