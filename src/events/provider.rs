//! Game-thread event provider.

use std::sync::Arc;
use std::time::Duration;

use chatlink_proto::{PlayerLocation, StatusValue};
use tracing::warn;

use super::bus::{Dispatched, EventBus};
use super::types::*;
use super::Event;
use crate::game::{GameFuture, GameHandle, is_game_thread};
use crate::state::{OnlineUser, StatusKey};
use crate::telemetry::{DispatchTimer, spans};

/// Completion of a dispatch scheduled onto the game thread.
pub type EventFuture<E> = GameFuture<Dispatched<E>>;

/// Fires events on the game thread regardless of the calling thread.
#[derive(Clone)]
pub struct EventProvider {
    bus: Arc<EventBus>,
    game: GameHandle,
}

impl EventProvider {
    pub fn new(bus: Arc<EventBus>, game: GameHandle) -> Self {
        Self { bus, game }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn game(&self) -> &GameHandle {
        &self.game
    }

    /// Dispatch `event` on the game thread.
    ///
    /// From the game thread itself the dispatch runs inline and the future
    /// is already resolved; from anywhere else it is queued.
    pub fn fire<E: Event>(&self, event: E) -> EventFuture<E> {
        let bus = self.bus.clone();
        self.game.call(move || dispatch_timed(&bus, event))
    }

    /// Dispatch `event` without waiting for the outcome. Used for events that
    /// report something already done, where cancellation has no effect.
    pub fn notify<E: Event>(&self, event: E) {
        if is_game_thread() {
            let _ = dispatch_timed(&self.bus, event);
            return;
        }
        let bus = self.bus.clone();
        if let Err(e) = self.game.schedule(move || {
            let _ = dispatch_timed(&bus, event);
        }) {
            warn!(event = E::NAME, error = %e, "Game thread unavailable, event dropped");
        }
    }

    /// Dispatch on the current thread. Callers must already be on the game
    /// thread, inside a task that owns the whole action.
    pub(crate) fn dispatch_here<E: Event>(&self, event: E) -> Dispatched<E> {
        debug_assert!(is_game_thread(), "{} dispatched off the game thread", E::NAME);
        dispatch_timed(&self.bus, event)
    }

    pub fn fire_chat_message(
        &self,
        sender: Arc<OnlineUser>,
        channel: &str,
        message: &str,
    ) -> EventFuture<ChatMessage> {
        self.fire(ChatMessage::new(sender, channel, message))
    }

    pub fn fire_private_message(
        &self,
        sender: Arc<OnlineUser>,
        recipients: Vec<Arc<OnlineUser>>,
        message: &str,
    ) -> EventFuture<PrivateMessage> {
        self.fire(PrivateMessage::new(sender, recipients, message))
    }

    pub fn fire_broadcast_message(
        &self,
        sender: Arc<OnlineUser>,
        message: &str,
    ) -> EventFuture<BroadcastMessage> {
        self.fire(BroadcastMessage::new(sender, message))
    }

    pub fn fire_channel_switch(
        &self,
        player: Arc<OnlineUser>,
        previous: Option<String>,
        new_channel: &str,
        reason: SwitchReason,
    ) -> EventFuture<ChannelSwitch> {
        self.fire(ChannelSwitch::new(player, previous, new_channel, reason))
    }

    pub fn fire_player_join_channel(
        &self,
        player: Arc<OnlineUser>,
        channel: &str,
        reason: JoinReason,
    ) -> EventFuture<PlayerJoinChannel> {
        self.fire(PlayerJoinChannel::new(player, channel, reason))
    }

    pub fn fire_player_leave_channel(
        &self,
        player: Arc<OnlineUser>,
        channel: &str,
        reason: LeaveReason,
    ) -> EventFuture<PlayerLeaveChannel> {
        self.fire(PlayerLeaveChannel::new(player, channel, reason))
    }

    pub fn fire_message_filter(
        &self,
        sender: Arc<OnlineUser>,
        channel: Option<String>,
        original: &str,
        filtered: &str,
        filter_type: FilterType,
        filter_name: &str,
    ) -> EventFuture<MessageFilter> {
        self.fire(MessageFilter::new(
            sender,
            channel,
            original,
            filtered,
            filter_type,
            filter_name,
        ))
    }

    pub fn fire_chat_command(
        &self,
        sender: Arc<OnlineUser>,
        command: &str,
        args: Vec<String>,
        phase: ExecutionPhase,
    ) -> EventFuture<ChatCommand> {
        self.fire(ChatCommand::new(sender, command, args, phase))
    }

    pub fn fire_player_health_change(
        &self,
        player: Arc<OnlineUser>,
        previous: f64,
        new: f64,
        max: f64,
        reason: HealthChangeReason,
        damager: Option<String>,
    ) -> EventFuture<PlayerHealthChange> {
        self.fire(PlayerHealthChange::new(player, previous, new, max, reason, damager))
    }

    pub fn fire_player_location_change(
        &self,
        player: Arc<OnlineUser>,
        previous: Option<PlayerLocation>,
        new: PlayerLocation,
        reason: MovementReason,
    ) -> EventFuture<PlayerLocationChange> {
        self.fire(PlayerLocationChange::new(player, previous, new, reason))
    }

    pub fn fire_player_status_change(
        &self,
        player: Arc<OnlineUser>,
        key: StatusKey,
        previous: Option<StatusValue>,
        new: StatusValue,
        reason: &str,
        duration: Option<Duration>,
    ) -> EventFuture<PlayerStatusChange> {
        self.fire(PlayerStatusChange::new(player, key, previous, new, reason, duration))
    }

    pub fn fire_player_death(
        &self,
        player: Arc<OnlineUser>,
        death_message: &str,
        cause: DeathCause,
        killer: Option<Arc<OnlineUser>>,
        death_location: Option<PlayerLocation>,
    ) -> EventFuture<PlayerDeath> {
        self.fire(PlayerDeath::new(player, death_message, cause, killer, death_location))
    }

    pub fn fire_player_respawn(
        &self,
        player: Arc<OnlineUser>,
        respawn_location: Option<PlayerLocation>,
        reason: RespawnReason,
    ) -> EventFuture<PlayerRespawn> {
        self.fire(PlayerRespawn::new(player, respawn_location, reason))
    }
}

fn dispatch_timed<E: Event>(bus: &EventBus, event: E) -> Dispatched<E> {
    let _span = spans::dispatch(E::NAME).entered();
    let _timer = DispatchTimer::new(E::NAME);
    bus.dispatch(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::error::EventError;
    use crate::events::Priority;
    use crate::game::{GameHandle, GameThread};

    fn provider() -> (GameThread, EventProvider) {
        let game = GameThread::spawn("provider-test").unwrap();
        let provider = EventProvider::new(Arc::new(EventBus::new()), game.handle());
        (game, provider)
    }

    fn console() -> Arc<OnlineUser> {
        Arc::new(OnlineUser::console("test"))
    }

    #[test]
    fn listeners_run_on_the_game_thread() {
        let (_game, provider) = provider();
        provider
            .bus()
            .register::<ChatMessage, _>(Priority::Normal, "thread-check", |ctx| {
                anyhow::ensure!(is_game_thread(), "off game thread");
                ctx.event_mut().set_message("checked");
                Ok(())
            });
        let out = provider
            .fire_chat_message(console(), "global", "hello")
            .wait()
            .unwrap();
        assert_eq!(out.event.message(), "checked");
        assert!(!out.cancelled);
    }

    #[test]
    fn cancellation_reaches_the_caller() {
        let (_game, provider) = provider();
        provider
            .bus()
            .register::<BroadcastMessage, _>(Priority::High, "veto", |ctx| {
                ctx.cancel();
                Ok(())
            });
        let out = provider.fire_broadcast_message(console(), "hi").wait().unwrap();
        assert!(out.is_cancelled());
    }

    #[test]
    fn waiting_inside_a_listener_is_refused() {
        let (_game, provider) = provider();
        let inner = provider.clone();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = seen.clone();
        provider
            .bus()
            .register::<PlayerJoinChannel, _>(Priority::Normal, "nested", move |_| {
                // Refused on the game thread even though the nested
                // dispatch already ran inline.
                let nested = inner.fire_broadcast_message(console(), "nested").wait();
                *s.lock() = Some(nested.map(|d| d.cancelled));
                Ok(())
            });
        provider
            .fire_player_join_channel(console(), "global", JoinReason::ApiCall)
            .wait()
            .unwrap();
        assert_eq!(*seen.lock(), Some(Err(EventError::WouldDeadlock)));
    }

    #[test]
    fn notify_reaches_listeners_in_queue_order() {
        let (game, provider) = provider();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        provider
            .bus()
            .monitor::<BroadcastMessage, _>("log", move |ev, _| {
                s.lock().push(ev.message().to_owned());
                Ok(())
            });
        provider.notify(BroadcastMessage::new(console(), "one"));
        provider.notify(BroadcastMessage::new(console(), "two"));
        game.handle().call(|| ()).wait().unwrap();
        assert_eq!(*seen.lock(), vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test]
    fn notify_without_game_thread_is_dropped() {
        let provider = EventProvider::new(Arc::new(EventBus::new()), GameHandle::detached());
        let seen = Arc::new(AtomicBool::new(false));
        let s = seen.clone();
        provider
            .bus()
            .monitor::<BroadcastMessage, _>("log", move |_, _| {
                s.store(true, Ordering::SeqCst);
                Ok(())
            });
        provider.notify(BroadcastMessage::new(console(), "lost"));
        assert!(!seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn awaited_from_async_code() {
        let (_game, provider) = provider();
        let out = provider
            .fire_player_respawn(console(), None, RespawnReason::Bed)
            .await
            .unwrap();
        assert_eq!(out.event.reason(), RespawnReason::Bed);
        assert!(!out.event.should_send_message());
    }
}
