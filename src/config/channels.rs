//! Channel definitions and chat rules.

use serde::Deserialize;

use super::defaults::{
    default_broadcast_format, default_bypass_permission, default_chat_format,
    default_private_format,
};
use crate::channels::Channel;

/// One `[[channels]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelBlock {
    /// Unique channel id (e.g. "global", "staff").
    pub id: String,
    /// Name shown to players. Defaults to the id.
    pub display_name: Option<String>,
    /// Shortcut commands that switch to this channel (e.g. "/g").
    #[serde(default)]
    pub shortcuts: Vec<String>,
}

impl ChannelBlock {
    pub fn to_channel(&self) -> Channel {
        let display = self.display_name.as_deref().unwrap_or(&self.id);
        Channel::new(&*self.id, display)
            .with_shortcuts(self.shortcuts.iter().map(|s| s.trim_start_matches('/')))
    }
}

/// `[chat]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Channel message template: `{channel}`, `{player}`, `{server}`, `{message}`.
    #[serde(default = "default_chat_format")]
    pub format: String,
    /// Private message template: adds `{recipient}`.
    #[serde(default = "default_private_format")]
    pub private_format: String,
    #[serde(default = "default_broadcast_format")]
    pub broadcast_format: String,
    /// Channels closed to players in combat. `*` matches every channel.
    #[serde(default)]
    pub restrict_in_combat: Vec<String>,
    /// Channels closed to players at critical health. `*` matches every
    /// channel.
    #[serde(default)]
    pub restrict_on_critical_health: Vec<String>,
    /// Words masked by the built-in word filter.
    #[serde(default)]
    pub blocked_words: Vec<String>,
    /// Permission that skips the combat and health restrictions.
    #[serde(default = "default_bypass_permission")]
    pub bypass_permission: String,
}

impl ChatConfig {
    pub fn restricts_in_combat(&self, channel: &str) -> bool {
        matches_channel(&self.restrict_in_combat, channel)
    }

    pub fn restricts_on_critical_health(&self, channel: &str) -> bool {
        matches_channel(&self.restrict_on_critical_health, channel)
    }
}

fn matches_channel(list: &[String], channel: &str) -> bool {
    list.iter().any(|c| c == "*" || c == channel)
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            format: default_chat_format(),
            private_format: default_private_format(),
            broadcast_format: default_broadcast_format(),
            restrict_in_combat: Vec::new(),
            restrict_on_critical_health: Vec::new(),
            blocked_words: Vec::new(),
            bypass_permission: default_bypass_permission(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_restricts_every_channel() {
        let chat = ChatConfig {
            restrict_in_combat: vec!["*".into()],
            restrict_on_critical_health: vec!["global".into()],
            ..ChatConfig::default()
        };
        assert!(chat.restricts_in_combat("staff"));
        assert!(chat.restricts_on_critical_health("global"));
        assert!(!chat.restricts_on_critical_health("staff"));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let block: ChannelBlock = toml::from_str(r#"id = "trade""#).unwrap();
        let channel = block.to_channel();
        assert_eq!(channel.id, "trade");
        assert_eq!(channel.display_name, "trade");
        assert!(channel.shortcuts.is_empty());
    }
}
