//! Collaborator seams: permissions, formatting, filtering, delivery and
//! bridging.
//!
//! The core only ever talks to these traits. The defaults are enough to run
//! a daemon that logs chat instead of delivering it.

use tracing::info;
use uuid::Uuid;

use crate::events::FilterType;
use crate::state::OnlineUser;

/// Permission lookups.
pub trait PermissionProvider: Send + Sync {
    /// Whether `player` holds `node`; `default` when the backend has no
    /// opinion.
    fn has_permission(&self, player: Uuid, node: &str, default: bool) -> bool;
}

/// Answers `default` for everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissions;

impl PermissionProvider for DefaultPermissions {
    fn has_permission(&self, _player: Uuid, _node: &str, default: bool) -> bool {
        default
    }
}

/// Renders a chat format template for a sender.
pub trait Formatter: Send + Sync {
    fn format(&self, template: &str, sender: &OnlineUser) -> String;
}

/// Replaces `{player}` and `{server}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderFormatter;

impl Formatter for PlaceholderFormatter {
    fn format(&self, template: &str, sender: &OnlineUser) -> String {
        let server = sender
            .current_server()
            .unwrap_or_else(|| sender.identity().origin.clone());
        template
            .replace("{player}", sender.username())
            .replace("{server}", &server)
    }
}

/// One stage of the outbound chat filter chain.
pub trait ChatFilter: Send + Sync {
    fn name(&self) -> &str;

    fn filter_type(&self) -> FilterType;

    /// The rewritten text, or `None` when the filter left `message` alone.
    fn apply(&self, sender: &OnlineUser, message: &str) -> Option<String>;
}

/// Masks configured words with `*`, ignoring ASCII case.
#[derive(Debug, Default, Clone)]
pub struct WordFilter {
    words: Vec<String>,
}

impl WordFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_ascii_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl ChatFilter for WordFilter {
    fn name(&self) -> &str {
        "word_filter"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Profanity
    }

    fn apply(&self, _sender: &OnlineUser, message: &str) -> Option<String> {
        let lower = message.to_ascii_lowercase();
        let mut masked = vec![false; message.len()];
        let mut hit = false;
        for word in &self.words {
            for (start, found) in lower.match_indices(word.as_str()) {
                masked[start..start + found.len()].fill(true);
                hit = true;
            }
        }
        if !hit {
            return None;
        }
        Some(
            message
                .char_indices()
                .map(|(i, c)| if masked[i] { '*' } else { c })
                .collect(),
        )
    }
}

/// Final hop for rendered text.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, recipient: &OnlineUser, text: &str);
}

/// Logs each delivery at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn deliver(&self, recipient: &OnlineUser, text: &str) {
        info!(to = %recipient.username(), text, "Deliver");
    }
}

/// A chat line crossing to or from an external platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgedMessage {
    pub platform: String,
    pub author: String,
    pub channel: String,
    pub content: String,
}

/// Outbound side of an external chat bridge.
pub trait ChatBridge: Send + Sync {
    fn relay(&self, message: &BridgedMessage);
}

/// Bridge that relays nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBridge;

impl ChatBridge for NoBridge {
    fn relay(&self, _message: &BridgedMessage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_formatter_uses_current_server() {
        let user = OnlineUser::bridged("discord", "alice");
        let fmt = PlaceholderFormatter;
        assert_eq!(fmt.format("[{server}] {player}", &user), "[bridge:discord] alice");
        user.set_current_server("survival");
        assert_eq!(fmt.format("[{server}] {player}", &user), "[survival] alice");
    }

    #[test]
    fn word_filter_masks_case_insensitively() {
        let user = OnlineUser::bridged("discord", "alice");
        let filter = WordFilter::new(["heck", " "]);
        assert_eq!(filter.apply(&user, "what the HECK"), Some("what the ****".to_owned()));
        assert_eq!(filter.apply(&user, "all fine"), None);
        assert!(WordFilter::new(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn default_permissions_pass_through() {
        let perms = DefaultPermissions;
        assert!(perms.has_permission(Uuid::nil(), "chatlink.bypass", true));
        assert!(!perms.has_permission(Uuid::nil(), "chatlink.bypass", false));
    }
}
