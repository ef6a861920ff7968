//! Player state: status caches, users, sessions and channel membership.

mod dashmap_ext;
mod membership;
mod sessions;
mod status_cache;
mod user;

pub use dashmap_ext::DashMapExt;
pub use membership::{InMemoryMembership, MembershipStore};
pub use sessions::{EXPIRED_REASON, SessionRegistry};
pub use status_cache::{DEFAULT_STATUSES, ExpireHook, StatusCache, StatusKey, WriteOutcome};
pub use user::{
    Attribute, BridgedState, CONSOLE_NAME, CachedState, Capabilities, ConsoleState, Identity,
    LiveSnapshot, LiveState, OnlineUser, StateProvider,
};
