//! Live sessions on this process.

use std::sync::{Arc, Weak};

use chatlink_proto::StatusValue;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{debug, info};
use uuid::Uuid;

use super::dashmap_ext::DashMapExt;
use super::status_cache::{StatusCache, StatusKey};
use super::user::{CachedState, Identity, OnlineUser, StateProvider};
use crate::events::{EventProvider, PlayerStatusChange};

/// Reason carried by the status change fired when a value times out.
pub const EXPIRED_REASON: &str = "expired";

/// Every player with a session here, by UUID.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<OnlineUser>>,
    runtime: Option<Handle>,
    events: EventProvider,
}

impl SessionRegistry {
    /// `runtime` drives status expiry timers for every session opened here.
    pub fn new(runtime: Option<Handle>, events: EventProvider) -> Self {
        Self {
            sessions: DashMap::new(),
            runtime,
            events,
        }
    }

    /// Open a session backed by `state`.
    pub fn open(&self, identity: Identity, state: Arc<dyn StateProvider>) -> Arc<OnlineUser> {
        self.open_with(identity, |_| state)
    }

    /// Open a session whose gameplay attributes come from replicated status.
    pub fn open_cached(&self, identity: Identity) -> Arc<OnlineUser> {
        self.open_with(identity, |cache| Arc::new(CachedState::new(cache.clone())))
    }

    /// Open a session, building its state provider around the fresh cache.
    ///
    /// The cache is seeded with the default statuses. An existing session for
    /// the same UUID is closed first.
    pub fn open_with<F>(&self, identity: Identity, make_state: F) -> Arc<OnlineUser>
    where
        F: FnOnce(&Arc<StatusCache>) -> Arc<dyn StateProvider>,
    {
        let cache = Arc::new(StatusCache::seeded(self.runtime.clone()));
        let state = make_state(&cache);
        let uuid = identity.uuid;
        let user = Arc::new(OnlineUser::new(identity, state, cache.clone()));

        let weak: Weak<OnlineUser> = Arc::downgrade(&user);
        let events = self.events.clone();
        cache.set_expire_hook(Arc::new(move |key: StatusKey, value: StatusValue| {
            let Some(player) = weak.upgrade() else {
                return;
            };
            debug!(player = %player.username(), key = %key, "Status expired");
            // Informational: the value is already gone.
            events.notify(PlayerStatusChange::new(
                player,
                key,
                Some(value),
                StatusValue::Null,
                EXPIRED_REASON,
                None,
            ));
        }));

        if let Some(old) = self.sessions.insert(uuid, user.clone()) {
            old.status().clear();
            debug!(uuid = %uuid, "Replaced existing session");
        }
        info!(uuid = %uuid, name = %user.username(), "Session opened");
        user
    }

    /// End a session. Pending expiries are cancelled.
    pub fn close(&self, uuid: Uuid) -> Option<Arc<OnlineUser>> {
        let (_, user) = self.sessions.remove(&uuid)?;
        user.status().clear();
        info!(uuid = %uuid, name = %user.username(), "Session closed");
        Some(user)
    }

    pub fn get(&self, uuid: Uuid) -> Option<Arc<OnlineUser>> {
        self.sessions.get_cloned(&uuid)
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.sessions.contains_key(&uuid)
    }

    /// Look up by username, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<OnlineUser>> {
        self.sessions
            .find_cloned(|_, user| user.username().eq_ignore_ascii_case(name))
    }

    pub fn all(&self) -> Vec<Arc<OnlineUser>> {
        self.sessions.values_cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, PlayerStatusChange};
    use crate::game::GameThread;
    use crate::state::user::LiveState;
    use chatlink_proto::StatusType;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn registry(runtime: Option<Handle>) -> (GameThread, SessionRegistry) {
        let game = GameThread::spawn("sessions-test").unwrap();
        let events = EventProvider::new(Arc::new(EventBus::new()), game.handle());
        (game, SessionRegistry::new(runtime, events))
    }

    #[test]
    fn open_seeds_and_close_clears() {
        let (_game, sessions) = registry(None);
        let uuid = Uuid::new_v4();
        let user = sessions.open(
            Identity::new(uuid, "Steve", "survival"),
            Arc::new(LiveState::default()),
        );
        assert_eq!(user.status().get_status(StatusType::Away), Some(StatusValue::Bool(false)));
        assert!(sessions.contains(uuid));
        assert_eq!(sessions.find_by_name("steve").map(|u| u.uuid()), Some(uuid));

        let closed = sessions.close(uuid).unwrap();
        assert!(closed.status().is_empty());
        assert!(sessions.get(uuid).is_none());
        assert!(sessions.close(uuid).is_none());
    }

    #[test]
    fn reopen_replaces_session() {
        let (_game, sessions) = registry(None);
        let uuid = Uuid::new_v4();
        let first = sessions.open_cached(Identity::new(uuid, "Alex", "proxy"));
        let second = sessions.open_cached(Identity::new(uuid, "Alex", "proxy"));
        assert_eq!(sessions.len(), 1);
        assert!(first.status().is_empty());
        assert!(Arc::ptr_eq(&sessions.get(uuid).unwrap(), &second));
    }

    #[tokio::test]
    async fn expiry_fires_status_change_once() {
        let game = GameThread::spawn("sessions-expiry").unwrap();
        let bus = Arc::new(EventBus::new());
        let events = EventProvider::new(bus.clone(), game.handle());
        let sessions = SessionRegistry::new(Some(Handle::current()), events);

        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        bus.monitor::<PlayerStatusChange, _>("expiry", move |ev, _| {
            f.lock().push((ev.key().clone(), ev.reason().to_owned()));
            Ok(())
        });

        let user = sessions.open_cached(Identity::new(Uuid::new_v4(), "Alex", "proxy"));
        user.status()
            .write(
                StatusType::Combat.into(),
                StatusValue::Bool(true),
                1,
                Some(Duration::from_millis(30)),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        // Let the game thread drain the scheduled dispatch.
        sessions.events.game().call(|| ()).await.unwrap();

        assert_eq!(
            *fired.lock(),
            vec![(StatusKey::Known(StatusType::Combat), EXPIRED_REASON.to_owned())]
        );
    }
}
