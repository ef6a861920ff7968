//! Channel membership storage.
//!
//! Membership is one channel id per player. Channel member lists are never
//! stored; they are derived by scanning.

use dashmap::DashMap;
use uuid::Uuid;

use super::dashmap_ext::DashMapExt;

/// Where a player's current channel is recorded.
///
/// Mutated only from the game thread; reads may come from anywhere.
pub trait MembershipStore: Send + Sync {
    fn get(&self, player: Uuid) -> Option<String>;

    /// Record `channel` as the player's channel, returning the previous one.
    fn set(&self, player: Uuid, channel: &str) -> Option<String>;

    fn remove(&self, player: Uuid) -> Option<String>;

    /// Every player whose channel is `channel`.
    fn members_of(&self, channel: &str) -> Vec<Uuid>;
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryMembership {
    channels: DashMap<Uuid, String>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MembershipStore for InMemoryMembership {
    fn get(&self, player: Uuid) -> Option<String> {
        self.channels.get_cloned(&player)
    }

    fn set(&self, player: Uuid, channel: &str) -> Option<String> {
        self.channels.insert(player, channel.to_owned())
    }

    fn remove(&self, player: Uuid) -> Option<String> {
        self.channels.remove(&player).map(|(_, c)| c)
    }

    fn members_of(&self, channel: &str) -> Vec<Uuid> {
        self.channels.keys_where(|c| c == channel)
    }
}
