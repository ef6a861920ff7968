//! Inbound envelope routing.
//!
//! Decodes frames from links and applies them locally. Routing is by
//! `message_type` alone; nothing here returns an error to the transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use chatlink_proto::frame::Frame;
use chatlink_proto::{MessageType, PlayerLocation, PlayerStatusMessage, StatusType, StatusValue};
use tracing::{debug, trace, warn};

use crate::channels::ChannelRegistry;
use crate::collab::MessageSink;
use crate::events::{
    ChatCommand, DeathCause, EventProvider, ExecutionPhase, HealthChangeReason, MovementReason,
    PlayerDeath, PlayerHealthChange, PlayerLocationChange, PlayerRespawn, PlayerStatusChange,
    RespawnReason,
};
use crate::state::{Attribute, OnlineUser, SessionRegistry, StatusKey, WriteOutcome};
use crate::sync::manager::{Role, SyncManager};
use crate::telemetry::spans;

/// Which message types a role accepts. Everything else arrived in the wrong
/// direction.
pub fn accepts(role: Role, message_type: MessageType) -> bool {
    match role {
        Role::Proxy => matches!(
            message_type,
            MessageType::StatusUpdate
                | MessageType::HealthChange
                | MessageType::LocationChange
                | MessageType::PlayerDeath
                | MessageType::PlayerRespawn
                | MessageType::CommandExecution
                | MessageType::SyncResponse
        ),
        Role::Backend => matches!(
            message_type,
            MessageType::SyncRequest | MessageType::StatusUpdate
        ),
    }
}

/// Reason attached to status changes applied from a snapshot.
const SYNC_REASON: &str = "sync";

/// Applies inbound envelopes to local state.
#[derive(Clone)]
pub struct SyncRouter {
    manager: SyncManager,
    sessions: Arc<SessionRegistry>,
    events: EventProvider,
    channels: Arc<ChannelRegistry>,
    sink: Arc<dyn MessageSink>,
}

impl SyncRouter {
    pub fn new(
        manager: SyncManager,
        sessions: Arc<SessionRegistry>,
        events: EventProvider,
        channels: Arc<ChannelRegistry>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            manager,
            sessions,
            events,
            channels,
            sink,
        }
    }

    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }

    /// Handle one frame from `peer`. Frames on other channels are ignored.
    pub fn handle_frame(&self, peer: &str, frame: &Frame) {
        if !frame.is_on(&self.manager.channel) {
            trace!(peer = %peer, channel = %frame.channel, "Ignoring frame on foreign channel");
            return;
        }
        match frame.to_envelope() {
            Ok(msg) => self.handle_envelope(msg),
            Err(e) => warn!(peer = %peer, error = %e, "Dropping undecodable envelope"),
        }
    }

    /// Apply one decoded envelope.
    pub fn handle_envelope(&self, msg: PlayerStatusMessage) {
        let kind = msg.message_type();
        if kind == MessageType::Unknown {
            warn!(server = %msg.server_name(), "Dropping envelope of unknown type");
            return;
        }
        if !accepts(self.manager.role, kind) {
            debug!(role = %self.manager.role, kind = %kind, "Dropping envelope sent in the wrong direction");
            return;
        }
        let Some(player) = self.sessions.get(msg.player_uuid()) else {
            debug!(uuid = %msg.player_uuid(), kind = %kind, "No local session, dropping envelope");
            return;
        };
        let _span = spans::session(player.uuid(), player.username()).entered();

        match kind {
            MessageType::StatusUpdate => self.on_status_update(player, &msg),
            MessageType::HealthChange => self.on_health_change(player, &msg),
            MessageType::LocationChange => self.on_location_change(player, &msg),
            MessageType::PlayerDeath => self.on_player_death(player, &msg),
            MessageType::PlayerRespawn => self.on_player_respawn(player, &msg),
            MessageType::CommandExecution => self.on_command_execution(player, &msg),
            MessageType::SyncRequest => self.on_sync_request(&player),
            MessageType::SyncResponse => self.on_sync_response(&player, &msg),
            MessageType::Unknown => {}
        }
    }

    fn on_status_update(&self, player: Arc<OnlineUser>, msg: &PlayerStatusMessage) {
        let update = match msg.as_status_update() {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "Dropping malformed status_update");
                return;
            }
        };
        self.place(&player, msg);
        let key = StatusKey::from_wire(&update.key);
        let value = update.value.clone();
        match player
            .status()
            .write(key.clone(), update.value, msg.timestamp(), None)
        {
            Ok(WriteOutcome::Applied { previous }) => {
                // Already applied; listeners observe, they cannot veto.
                self.events.notify(PlayerStatusChange::new(
                    player,
                    key,
                    previous,
                    value,
                    update.reason,
                    None,
                ));
            }
            Ok(WriteOutcome::Stale { cached_at }) => {
                trace!(key = %key, cached_at, timestamp = msg.timestamp(), "Stale status_update");
            }
            Err(e) => warn!(key = %key, error = %e, "Rejected status_update value"),
        }
    }

    fn on_health_change(&self, player: Arc<OnlineUser>, msg: &PlayerStatusMessage) {
        let change = match msg.as_health_change() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Dropping malformed health_change");
                return;
            }
        };
        self.place(&player, msg);
        let cache = player.status();
        let ts = msg.timestamp();
        let applied = cache.write(
            StatusType::Health.into(),
            StatusValue::Float(change.new_health),
            ts,
            None,
        );
        if let Err(e) = cache.write(
            StatusType::MaxHealth.into(),
            StatusValue::Float(change.max_health),
            ts,
            None,
        ) {
            warn!(error = %e, "Rejected max_health");
        }
        match applied {
            Ok(outcome) if outcome.is_applied() => {
                self.events.notify(PlayerHealthChange::new(
                    player,
                    change.previous_health,
                    change.new_health,
                    change.max_health,
                    HealthChangeReason::from_name(&change.reason),
                    None,
                ));
            }
            Ok(_) => trace!(timestamp = ts, "Stale health_change"),
            Err(e) => warn!(error = %e, "Rejected health"),
        }
    }

    fn on_location_change(&self, player: Arc<OnlineUser>, msg: &PlayerStatusMessage) {
        let change = match msg.as_location_change() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Dropping malformed location_change");
                return;
            }
        };
        let from = change.from;
        let to = change.to;
        let prior_server = player.current_server();
        self.place(&player, msg);
        let previous = player.set_last_location(to.clone());
        let last_server = previous
            .as_ref()
            .map(|l| l.server.as_str())
            .or(prior_server.as_deref());
        let reason = movement_reason(last_server, &from, &to);
        self.events.notify(PlayerLocationChange::new(player, Some(from), to, reason));
    }

    fn on_player_death(&self, player: Arc<OnlineUser>, msg: &PlayerStatusMessage) {
        let death = match msg.as_player_death() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Dropping malformed player_death");
                return;
            }
        };
        self.place(&player, msg);
        let killer = death
            .killer
            .as_deref()
            .and_then(|name| self.sessions.find_by_name(name));
        let cause = if killer.is_some() {
            DeathCause::PlayerKill
        } else {
            DeathCause::Other
        };
        let event = PlayerDeath::new(
            player.clone(),
            death.death_message,
            cause,
            killer,
            player.last_location(),
        );
        let this = self.clone();
        self.schedule_announcement(move || {
            let done = this.events.dispatch_here(event);
            let ev = &done.event;
            if ev.should_send_message() {
                this.announce(ev.player(), ev.target_channel(), ev.death_message());
            }
        });
    }

    fn on_player_respawn(&self, player: Arc<OnlineUser>, msg: &PlayerStatusMessage) {
        let respawn = match msg.as_player_respawn() {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Dropping malformed player_respawn");
                return;
            }
        };
        self.place(&player, msg);
        let event = PlayerRespawn::new(
            player.clone(),
            player.last_location(),
            RespawnReason::from_name(&respawn.reason),
        );
        let this = self.clone();
        self.schedule_announcement(move || {
            let done = this.events.dispatch_here(event);
            let ev = &done.event;
            if let (true, Some(text)) = (ev.should_send_message(), ev.message()) {
                this.announce(ev.player(), ev.target_channel(), text);
            }
        });
    }

    fn on_command_execution(&self, player: Arc<OnlineUser>, msg: &PlayerStatusMessage) {
        let exec = match msg.as_command_execution() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Dropping malformed command_execution");
                return;
            }
        };
        self.place(&player, msg);
        // Replay of a command that already ran on the backend.
        self.events.notify(ChatCommand::new(
            player,
            exec.command,
            exec.args,
            ExecutionPhase::from_name(&exec.phase),
        ));
    }

    fn on_sync_request(&self, player: &OnlineUser) {
        let snapshot = snapshot_of(player);
        let reply = PlayerStatusMessage::sync_response(&self.manager.subject_for(player), snapshot);
        if let Err(e) = self.manager.send_to_proxy(&reply) {
            warn!(player = %player.username(), error = %e, "Could not answer sync_request");
        }
    }

    fn on_sync_response(&self, player: &OnlineUser, msg: &PlayerStatusMessage) {
        self.place(player, msg);
        let ts = msg.timestamp();
        let mut applied = 0usize;
        for (wire_key, value) in msg.data() {
            let key = StatusKey::from_wire(wire_key);
            match player.status().write(key, value.clone(), ts, None) {
                Ok(outcome) if outcome.is_applied() => applied += 1,
                Ok(_) => {}
                Err(e) => warn!(key = %wire_key, error = %e, "Dropping snapshot key"),
            }
        }
        debug!(
            player = %player.username(),
            applied,
            total = msg.data().len(),
            reason = SYNC_REASON,
            "Applied status snapshot"
        );
    }

    /// On the proxy, track which backend the player is on. A report older
    /// than the one that last placed the player does not move them.
    fn place(&self, player: &OnlineUser, msg: &PlayerStatusMessage) {
        if self.manager.role != Role::Proxy {
            return;
        }
        if !player.observe_server(msg.server_name(), msg.timestamp()) {
            trace!(server = %msg.server_name(), timestamp = msg.timestamp(), "Stale server report");
        }
    }

    fn schedule_announcement<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.events.game().schedule(task) {
            warn!(error = %e, "Game thread unavailable, event dropped");
        }
    }

    /// Deliver `text` to `channel`, or to the player's own channel.
    fn announce(&self, player: &OnlineUser, channel: Option<&str>, text: &str) {
        let channel = channel
            .map(str::to_owned)
            .or_else(|| self.channels.channel_of(player.uuid()))
            .unwrap_or_else(|| self.channels.default_channel());
        let delivered = self
            .channels
            .deliver_to_members(&channel, &self.sessions, self.sink.as_ref(), text);
        debug!(channel = %channel, delivered, "Announcement delivered");
    }
}

/// `last_server` is where the player was last seen, from a cached location
/// or failing that the server of the last envelope.
fn movement_reason(
    last_server: Option<&str>,
    from: &PlayerLocation,
    to: &PlayerLocation,
) -> MovementReason {
    if last_server.is_some_and(|s| s != to.server) {
        MovementReason::ServerSwitch
    } else if from.world != to.world {
        MovementReason::WorldChange
    } else {
        MovementReason::Teleport
    }
}

/// Full snapshot of a player for a `sync_response`: every cached status
/// plus whatever gameplay attributes the platform supports.
pub fn snapshot_of(player: &OnlineUser) -> BTreeMap<String, StatusValue> {
    let mut snapshot = player.status().snapshot();
    let mut put = |status: StatusType, value: Attribute<StatusValue>| {
        if let Attribute::Supported(v) = value {
            snapshot.insert(status.key().to_owned(), v);
        }
    };
    put(StatusType::Health, player.health().map(StatusValue::Float));
    put(StatusType::MaxHealth, player.max_health().map(StatusValue::Float));
    put(StatusType::FoodLevel, player.food_level().map(StatusValue::Int));
    put(StatusType::ExperienceLevel, player.experience_level().map(StatusValue::Int));
    put(StatusType::GameMode, player.game_mode().map(StatusValue::Str));
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_table() {
        assert!(accepts(Role::Proxy, MessageType::HealthChange));
        assert!(accepts(Role::Proxy, MessageType::SyncResponse));
        assert!(!accepts(Role::Proxy, MessageType::SyncRequest));
        assert!(accepts(Role::Backend, MessageType::SyncRequest));
        assert!(accepts(Role::Backend, MessageType::StatusUpdate));
        assert!(!accepts(Role::Backend, MessageType::HealthChange));
        assert!(!accepts(Role::Backend, MessageType::Unknown));
    }

    #[test]
    fn movement_reasons() {
        let a = PlayerLocation::new("lobby", "world", 0.0, 0.0, 0.0);
        let b = PlayerLocation::new("lobby", "world_nether", 0.0, 0.0, 0.0);
        let c = PlayerLocation::new("survival", "world", 0.0, 0.0, 0.0);
        assert_eq!(movement_reason(None, &a, &a), MovementReason::Teleport);
        assert_eq!(movement_reason(None, &a, &b), MovementReason::WorldChange);
        assert_eq!(movement_reason(Some("lobby"), &c, &c), MovementReason::ServerSwitch);
        assert_eq!(movement_reason(Some("survival"), &a, &c), MovementReason::Teleport);
        // A server known only from envelopes still marks a switch.
        assert_eq!(movement_reason(Some("lobby"), &a, &c), MovementReason::ServerSwitch);
    }
}
