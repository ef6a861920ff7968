//! Channel definitions and derived membership queries.

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::collab::MessageSink;
use crate::state::{MembershipStore, SessionRegistry};

/// A chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub display_name: String,
    /// Command labels that switch into this channel, without the slash.
    pub shortcuts: Vec<String>,
}

impl Channel {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            shortcuts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_shortcuts<I, S>(mut self, shortcuts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shortcuts = shortcuts.into_iter().map(Into::into).collect();
        self
    }

    fn answers_to(&self, label: &str) -> bool {
        self.shortcuts.iter().any(|s| s.eq_ignore_ascii_case(label))
    }
}

struct Definitions {
    channels: Vec<Channel>,
    default_channel: String,
}

/// Channel definitions plus the membership store they are queried against.
///
/// Definitions are replaced only on the game thread (reload); membership is
/// never cached here.
pub struct ChannelRegistry {
    definitions: RwLock<Definitions>,
    membership: Arc<dyn MembershipStore>,
}

impl ChannelRegistry {
    pub fn new(
        channels: Vec<Channel>,
        default_channel: impl Into<String>,
        membership: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            definitions: RwLock::new(Definitions {
                channels,
                default_channel: default_channel.into(),
            }),
            membership,
        }
    }

    /// Swap in a new set of definitions. Existing memberships are kept even
    /// if their channel disappeared.
    pub fn replace(&self, channels: Vec<Channel>, default_channel: impl Into<String>) {
        let mut defs = self.definitions.write();
        defs.channels = channels;
        defs.default_channel = default_channel.into();
    }

    pub fn membership(&self) -> &Arc<dyn MembershipStore> {
        &self.membership
    }

    pub fn get(&self, id: &str) -> Option<Channel> {
        self.definitions
            .read()
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.read().channels.iter().any(|c| c.id == id)
    }

    /// Resolve a shortcut command label; a leading `/` is ignored.
    pub fn by_shortcut(&self, label: &str) -> Option<Channel> {
        let label = label.strip_prefix('/').unwrap_or(label);
        self.definitions
            .read()
            .channels
            .iter()
            .find(|c| c.answers_to(label))
            .cloned()
    }

    pub fn default_channel(&self) -> String {
        self.definitions.read().default_channel.clone()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.definitions.read().channels.clone()
    }

    /// The channel `player` is currently in.
    pub fn channel_of(&self, player: Uuid) -> Option<String> {
        self.membership.get(player)
    }

    pub fn players_in_channel(&self, id: &str) -> Vec<Uuid> {
        self.membership.members_of(id)
    }

    pub fn is_player_in_channel(&self, player: Uuid, id: &str) -> bool {
        self.membership.get(player).is_some_and(|c| c == id)
    }

    /// Deliver `text` to every member of `id` with a session here.
    /// Returns the number of deliveries.
    pub fn deliver_to_members(
        &self,
        id: &str,
        sessions: &SessionRegistry,
        sink: &dyn MessageSink,
        text: &str,
    ) -> usize {
        let mut delivered = 0;
        for member in self
            .players_in_channel(id)
            .into_iter()
            .filter_map(|uuid| sessions.get(uuid))
        {
            sink.deliver(&member, text);
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryMembership;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(
            vec![
                Channel::new("global", "Global").with_shortcuts(["g", "global"]),
                Channel::new("staff", "Staff").with_shortcuts(["sc"]),
            ],
            "global",
            Arc::new(InMemoryMembership::new()),
        )
    }

    #[test]
    fn lookups() {
        let reg = registry();
        assert_eq!(reg.get("staff").map(|c| c.display_name), Some("Staff".into()));
        assert!(reg.get("trade").is_none());
        assert_eq!(reg.by_shortcut("/SC").map(|c| c.id), Some("staff".into()));
        assert_eq!(reg.by_shortcut("g").map(|c| c.id), Some("global".into()));
        assert!(reg.by_shortcut("/nope").is_none());
        assert_eq!(reg.default_channel(), "global");
    }

    #[test]
    fn membership_is_derived() {
        let reg = registry();
        let a = Uuid::new_v4();
        reg.membership().set(a, "staff");
        assert!(reg.is_player_in_channel(a, "staff"));
        assert!(!reg.is_player_in_channel(a, "global"));
        assert_eq!(reg.players_in_channel("staff"), vec![a]);
        assert_eq!(reg.channel_of(a).as_deref(), Some("staff"));
    }

    #[test]
    fn replace_keeps_memberships() {
        let reg = registry();
        let a = Uuid::new_v4();
        reg.membership().set(a, "staff");
        reg.replace(vec![Channel::new("local", "Local")], "local");
        assert!(!reg.contains("staff"));
        assert_eq!(reg.channel_of(a).as_deref(), Some("staff"));
        assert_eq!(reg.default_channel(), "local");
    }
}
