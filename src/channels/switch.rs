//! Channel switch protocol.
//!
//! A switch runs as one game-thread task: cancellable `ChannelSwitch`, then
//! `PlayerLeaveChannel` for the old channel, then the membership commit, then
//! `PlayerJoinChannel`. A cancelled switch fires nothing further and leaves
//! membership untouched.

use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::ChannelRegistry;
use crate::events::{
    ChannelSwitch, EventProvider, JoinReason, LeaveReason, PlayerJoinChannel, PlayerLeaveChannel,
    SwitchReason,
};
use crate::game::GameFuture;
use crate::state::OnlineUser;

/// How a switch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Membership now points at `to`.
    Switched { from: Option<String>, to: String },
    /// A listener cancelled the switch.
    Cancelled,
    /// The requested (or rewritten) channel is not defined.
    UnknownChannel(String),
}

impl SwitchOutcome {
    pub fn is_switched(&self) -> bool {
        matches!(self, Self::Switched { .. })
    }
}

/// Runs switches against a registry.
#[derive(Clone)]
pub struct SwitchCoordinator {
    events: EventProvider,
    registry: Arc<ChannelRegistry>,
}

impl SwitchCoordinator {
    pub fn new(events: EventProvider, registry: Arc<ChannelRegistry>) -> Self {
        Self { events, registry }
    }

    /// Move `player` to `target`. Resolves once every step has run.
    ///
    /// Switching into the channel the player is already in still runs the
    /// whole sequence.
    pub fn switch(
        &self,
        player: Arc<OnlineUser>,
        target: &str,
        reason: SwitchReason,
    ) -> GameFuture<SwitchOutcome> {
        let this = self.clone();
        let target = target.to_owned();
        self.events
            .game()
            .call(move || this.switch_here(player, &target, reason))
    }

    /// Drop `player` from whatever channel they are in.
    pub fn leave(&self, player: Arc<OnlineUser>, reason: LeaveReason) -> GameFuture<Option<String>> {
        let this = self.clone();
        self.events.game().call(move || {
            let channel = this.registry.membership().remove(player.uuid())?;
            this.events
                .dispatch_here(PlayerLeaveChannel::new(player, &*channel, reason));
            Some(channel)
        })
    }

    /// Run a switch on the current thread. Callers must already be on the
    /// game thread.
    pub(crate) fn switch_here(
        &self,
        player: Arc<OnlineUser>,
        target: &str,
        reason: SwitchReason,
    ) -> SwitchOutcome {
        if !self.registry.contains(target) {
            debug!(player = %player.username(), channel = target, "Switch to unknown channel");
            return SwitchOutcome::UnknownChannel(target.to_owned());
        }

        let previous = self.registry.channel_of(player.uuid());
        let proposal = ChannelSwitch::new(player.clone(), previous.clone(), target, reason);
        let dispatched = self.events.dispatch_here(proposal);
        if dispatched.cancelled {
            debug!(player = %player.username(), channel = target, "Switch cancelled");
            return SwitchOutcome::Cancelled;
        }

        let to = dispatched.event.new_channel().to_owned();
        if to != target && !self.registry.contains(&to) {
            warn!(player = %player.username(), channel = %to, "Switch rewritten to unknown channel");
            return SwitchOutcome::UnknownChannel(to);
        }

        if let Some(from) = &previous {
            self.events.dispatch_here(PlayerLeaveChannel::new(
                player.clone(),
                from.as_str(),
                LeaveReason::ChannelSwitch,
            ));
        }

        self.registry.membership().set(player.uuid(), &to);
        debug!(player = %player.username(), from = ?previous, to = %to, "Channel switched");

        self.events
            .dispatch_here(PlayerJoinChannel::new(player, to.as_str(), JoinReason::from(reason)));

        SwitchOutcome::Switched { from: previous, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Channel;
    use crate::events::{EventBus, Priority};
    use crate::game::GameThread;
    use crate::state::{Identity, InMemoryMembership, LiveState};
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct Fixture {
        _game: GameThread,
        bus: Arc<EventBus>,
        registry: Arc<ChannelRegistry>,
        switches: SwitchCoordinator,
        log: Arc<Mutex<Vec<String>>>,
    }

    fn fixture() -> Fixture {
        let game = GameThread::spawn("switch-test").unwrap();
        let bus = Arc::new(EventBus::new());
        let events = EventProvider::new(bus.clone(), game.handle());
        let registry = Arc::new(ChannelRegistry::new(
            vec![Channel::new("global", "Global"), Channel::new("staff", "Staff")],
            "global",
            Arc::new(InMemoryMembership::new()),
        ));
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        bus.monitor::<ChannelSwitch, _>("log", move |ev, cancelled| {
            l.lock().push(format!("switch:{}:{cancelled}", ev.new_channel()));
            Ok(())
        });
        let l = log.clone();
        bus.monitor::<PlayerLeaveChannel, _>("log", move |ev, _| {
            l.lock().push(format!("leave:{}:{}", ev.channel(), ev.reason()));
            Ok(())
        });
        let l = log.clone();
        bus.monitor::<PlayerJoinChannel, _>("log", move |ev, _| {
            l.lock().push(format!("join:{}:{}", ev.channel(), ev.reason()));
            Ok(())
        });
        Fixture {
            _game: game,
            switches: SwitchCoordinator::new(events, registry.clone()),
            bus,
            registry,
            log,
        }
    }

    fn player() -> Arc<OnlineUser> {
        Arc::new(OnlineUser::new(
            Identity::new(Uuid::new_v4(), "Steve", "survival"),
            Arc::new(LiveState::default()),
            Arc::new(crate::state::StatusCache::with_runtime(None)),
        ))
    }

    #[test]
    fn first_switch_has_no_leave() {
        let fx = fixture();
        let p = player();
        let out = fx
            .switches
            .switch(p.clone(), "global", SwitchReason::PlayerJoin)
            .wait()
            .unwrap();
        assert_eq!(out, SwitchOutcome::Switched { from: None, to: "global".into() });
        assert_eq!(
            *fx.log.lock(),
            vec!["switch:global:false", "join:global:FIRST_LOGIN"]
        );
    }

    #[test]
    fn same_channel_switch_runs_every_step() {
        let fx = fixture();
        let p = player();
        fx.registry.membership().set(p.uuid(), "global");
        let out = fx
            .switches
            .switch(p.clone(), "global", SwitchReason::PlayerCommand)
            .wait()
            .unwrap();
        assert!(out.is_switched());
        assert_eq!(
            *fx.log.lock(),
            vec![
                "switch:global:false",
                "leave:global:CHANNEL_SWITCH",
                "join:global:MANUAL_SWITCH"
            ]
        );
        assert!(fx.registry.is_player_in_channel(p.uuid(), "global"));
    }

    #[test]
    fn cancelled_switch_changes_nothing() {
        let fx = fixture();
        fx.bus.register::<ChannelSwitch, _>(Priority::Normal, "veto", |ctx| {
            ctx.cancel();
            Ok(())
        });
        let p = player();
        fx.registry.membership().set(p.uuid(), "global");
        let out = fx
            .switches
            .switch(p.clone(), "staff", SwitchReason::PlayerCommand)
            .wait()
            .unwrap();
        assert_eq!(out, SwitchOutcome::Cancelled);
        assert_eq!(*fx.log.lock(), vec!["switch:staff:true"]);
        assert_eq!(fx.registry.channel_of(p.uuid()).as_deref(), Some("global"));
    }

    #[test]
    fn rewritten_target_is_committed() {
        let fx = fixture();
        fx.bus.register::<ChannelSwitch, _>(Priority::Normal, "redirect", |ctx| {
            ctx.event_mut().set_new_channel("staff");
            Ok(())
        });
        let p = player();
        let out = fx
            .switches
            .switch(p.clone(), "global", SwitchReason::AdminForce)
            .wait()
            .unwrap();
        assert_eq!(out, SwitchOutcome::Switched { from: None, to: "staff".into() });
        assert_eq!(fx.registry.channel_of(p.uuid()).as_deref(), Some("staff"));
    }

    #[test]
    fn unknown_channel_fires_nothing() {
        let fx = fixture();
        let out = fx
            .switches
            .switch(player(), "trade", SwitchReason::ApiCall)
            .wait()
            .unwrap();
        assert_eq!(out, SwitchOutcome::UnknownChannel("trade".into()));
        assert!(fx.log.lock().is_empty());
    }

    #[test]
    fn leave_fires_once() {
        let fx = fixture();
        let p = player();
        fx.registry.membership().set(p.uuid(), "staff");
        let left = fx.switches.leave(p.clone(), LeaveReason::Disconnect).wait().unwrap();
        assert_eq!(left.as_deref(), Some("staff"));
        let again = fx.switches.leave(p, LeaveReason::Disconnect).wait().unwrap();
        assert_eq!(again, None);
        assert_eq!(*fx.log.lock(), vec!["leave:staff:DISCONNECT"]);
    }
}
