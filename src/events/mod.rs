//! Cancellable event dispatch.
//!
//! Listeners register on an [`EventBus`] per event type. The
//! [`EventProvider`] moves every dispatch onto the game thread and hands the
//! caller an [`EventFuture`] that resolves once all listeners have run.

mod bus;
mod provider;
mod types;

use std::fmt::Debug;

pub use bus::{Dispatched, EventBus, EventContext, ListenerId, Priority};
pub use provider::{EventFuture, EventProvider};
pub use types::{
    BroadcastMessage, ChannelSwitch, ChatCommand, ChatMessage, CommandType, DeathCause,
    ExecutionPhase, FilterType, HealthChangeReason, JoinReason, LeaveReason, MessageFilter,
    MovementReason, PlayerDeath, PlayerHealthChange, PlayerJoinChannel, PlayerLeaveChannel,
    PlayerLocationChange, PlayerRespawn, PlayerStatusChange, PrivateMessage, RespawnReason,
    SwitchReason,
};

/// Anything that can be dispatched.
pub trait Event: Send + Debug + 'static {
    /// Label used in logs and spans.
    const NAME: &'static str;
}

/// Events whose listeners may veto the action.
pub trait Cancellable: Event {}
