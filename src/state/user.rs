//! Online users: identity, state capability, status cache.
//!
//! A user is composed from three parts instead of one wide interface:
//! an immutable [`Identity`], a [`StateProvider`] that answers only for the
//! attributes its platform really has, and the shared [`StatusCache`].
//! What a provider can answer is negotiated once, when the user is built.

use std::fmt;
use std::sync::Arc;

use chatlink_proto::{PlayerLocation, StatusType};
use parking_lot::RwLock;
use uuid::Uuid;

use super::status_cache::StatusCache;

/// Username of the reserved console identity.
pub const CONSOLE_NAME: &str = "[CONSOLE]";

/// Immutable identity of a user on one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uuid: Uuid,
    pub username: String,
    /// Label of the process or platform the user came from.
    pub origin: String,
}

impl Identity {
    pub fn new(uuid: Uuid, username: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            uuid,
            username: username.into(),
            origin: origin.into(),
        }
    }

    /// The console: nil UUID, name `[CONSOLE]`.
    pub fn console(origin: impl Into<String>) -> Self {
        Self::new(Uuid::nil(), CONSOLE_NAME, origin)
    }

    pub fn is_console(&self) -> bool {
        self.uuid.is_nil()
    }
}

/// Answer from a [`StateProvider`]: a real value, or an explicit "this
/// platform cannot say".
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute<T> {
    Supported(T),
    Unsupported,
}

impl<T> Attribute<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }

    pub fn supported(self) -> Option<T> {
        match self {
            Self::Supported(v) => Some(v),
            Self::Unsupported => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attribute<U> {
        match self {
            Self::Supported(v) => Attribute::Supported(f(v)),
            Self::Unsupported => Attribute::Unsupported,
        }
    }

    /// `Unsupported` for `None`.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Unsupported, Self::Supported)
    }
}

/// What a provider can answer. Read once per user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub health: bool,
    pub food: bool,
    pub game_mode: bool,
    pub experience: bool,
    pub location: bool,
}

impl Capabilities {
    /// Every attribute available.
    pub const ALL: Self = Self {
        health: true,
        food: true,
        game_mode: true,
        experience: true,
        location: true,
    };

    /// Nothing available.
    pub const NONE: Self = Self {
        health: false,
        food: false,
        game_mode: false,
        experience: false,
        location: false,
    };
}

/// Platform-specific source of gameplay attributes.
///
/// Implementations answer [`Attribute::Unsupported`] for anything they cannot
/// supply rather than inventing a value.
pub trait StateProvider: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    fn health(&self) -> Attribute<f64> {
        Attribute::Unsupported
    }

    fn max_health(&self) -> Attribute<f64> {
        Attribute::Unsupported
    }

    fn food_level(&self) -> Attribute<i64> {
        Attribute::Unsupported
    }

    fn experience_level(&self) -> Attribute<i64> {
        Attribute::Unsupported
    }

    fn game_mode(&self) -> Attribute<String> {
        Attribute::Unsupported
    }

    fn location(&self) -> Attribute<PlayerLocation> {
        Attribute::Unsupported
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Values a backend game feeds for one of its players.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    pub health: f64,
    pub max_health: f64,
    pub food_level: i64,
    pub experience_level: i64,
    pub game_mode: String,
    pub location: Option<PlayerLocation>,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            health: 20.0,
            max_health: 20.0,
            food_level: 20,
            experience_level: 0,
            game_mode: "SURVIVAL".to_owned(),
            location: None,
        }
    }
}

/// Backend player, kept current by the game.
#[derive(Default)]
pub struct LiveState {
    snapshot: RwLock<LiveSnapshot>,
}

impl LiveState {
    pub fn new(snapshot: LiveSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Mutate the snapshot in place.
    pub fn update(&self, f: impl FnOnce(&mut LiveSnapshot)) {
        f(&mut self.snapshot.write());
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshot.read().clone()
    }
}

impl StateProvider for LiveState {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn health(&self) -> Attribute<f64> {
        Attribute::Supported(self.snapshot.read().health)
    }

    fn max_health(&self) -> Attribute<f64> {
        Attribute::Supported(self.snapshot.read().max_health)
    }

    fn food_level(&self) -> Attribute<i64> {
        Attribute::Supported(self.snapshot.read().food_level)
    }

    fn experience_level(&self) -> Attribute<i64> {
        Attribute::Supported(self.snapshot.read().experience_level)
    }

    fn game_mode(&self) -> Attribute<String> {
        Attribute::Supported(self.snapshot.read().game_mode.clone())
    }

    fn location(&self) -> Attribute<PlayerLocation> {
        Attribute::from_option(self.snapshot.read().location.clone())
    }
}

/// Proxy player: answers from values replicated into the status cache.
/// An attribute nobody has synced yet is unsupported.
pub struct CachedState {
    cache: Arc<StatusCache>,
}

impl CachedState {
    pub fn new(cache: Arc<StatusCache>) -> Self {
        Self { cache }
    }
}

impl StateProvider for CachedState {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            location: false,
            ..Capabilities::ALL
        }
    }

    fn health(&self) -> Attribute<f64> {
        Attribute::from_option(self.cache.get_status(StatusType::Health).and_then(|v| v.as_f64()))
    }

    fn max_health(&self) -> Attribute<f64> {
        Attribute::from_option(
            self.cache
                .get_status(StatusType::MaxHealth)
                .and_then(|v| v.as_f64()),
        )
    }

    fn food_level(&self) -> Attribute<i64> {
        Attribute::from_option(
            self.cache
                .get_status(StatusType::FoodLevel)
                .and_then(|v| v.as_i64()),
        )
    }

    fn experience_level(&self) -> Attribute<i64> {
        Attribute::from_option(
            self.cache
                .get_status(StatusType::ExperienceLevel)
                .and_then(|v| v.as_i64()),
        )
    }

    fn game_mode(&self) -> Attribute<String> {
        Attribute::from_option(
            self.cache
                .get_status(StatusType::GameMode)
                .and_then(|v| v.as_str().map(str::to_owned)),
        )
    }
}

/// The server console.
pub struct ConsoleState;

impl StateProvider for ConsoleState {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }
}

/// A sender bridged in from an external chat platform.
pub struct BridgedState {
    pub platform: String,
}

impl StateProvider for BridgedState {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }
}

// ============================================================================
// OnlineUser
// ============================================================================

/// A user with a live session on this process.
pub struct OnlineUser {
    identity: Identity,
    status: Arc<StatusCache>,
    state: Arc<dyn StateProvider>,
    capabilities: Capabilities,
    /// Server the user is on, with the timestamp of the envelope that said so.
    current_server: RwLock<Option<(String, i64)>>,
    last_location: RwLock<Option<PlayerLocation>>,
}

impl OnlineUser {
    /// Compose a user. Capabilities are read from `state` here, once.
    pub fn new(identity: Identity, state: Arc<dyn StateProvider>, status: Arc<StatusCache>) -> Self {
        let capabilities = state.capabilities();
        Self {
            identity,
            status,
            state,
            capabilities,
            current_server: RwLock::new(None),
            last_location: RwLock::new(None),
        }
    }

    /// The console user.
    pub fn console(origin: &str) -> Self {
        Self::new(
            Identity::console(origin),
            Arc::new(ConsoleState),
            Arc::new(StatusCache::with_runtime(None)),
        )
    }

    /// A synthetic sender for a message bridged from `platform`.
    pub fn bridged(platform: &str, author: &str) -> Self {
        Self::new(
            Identity::new(Uuid::new_v4(), author, format!("bridge:{platform}")),
            Arc::new(BridgedState {
                platform: platform.to_owned(),
            }),
            Arc::new(StatusCache::with_runtime(None)),
        )
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn uuid(&self) -> Uuid {
        self.identity.uuid
    }

    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn is_console(&self) -> bool {
        self.identity.is_console()
    }

    pub fn status(&self) -> &Arc<StatusCache> {
        &self.status
    }

    pub fn state(&self) -> &Arc<dyn StateProvider> {
        &self.state
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn current_server(&self) -> Option<String> {
        self.current_server.read().as_ref().map(|(name, _)| name.clone())
    }

    /// Set the current server unconditionally.
    pub fn set_current_server(&self, server: impl Into<String>) {
        *self.current_server.write() = Some((server.into(), i64::MIN));
    }

    /// Move the user to `server` unless a newer report already placed them.
    /// Equal timestamps win, as in the status cache.
    pub fn observe_server(&self, server: &str, timestamp: i64) -> bool {
        let mut current = self.current_server.write();
        match current.as_ref() {
            Some((_, seen_at)) if timestamp < *seen_at => false,
            _ => {
                *current = Some((server.to_owned(), timestamp));
                true
            }
        }
    }

    /// Last location reported for this user by any server.
    pub fn last_location(&self) -> Option<PlayerLocation> {
        self.last_location.read().clone()
    }

    /// Record a new location, returning the previous one.
    pub fn set_last_location(&self, location: PlayerLocation) -> Option<PlayerLocation> {
        self.last_location.write().replace(location)
    }

    pub fn health(&self) -> Attribute<f64> {
        if self.capabilities.health {
            self.state.health()
        } else {
            Attribute::Unsupported
        }
    }

    pub fn max_health(&self) -> Attribute<f64> {
        if self.capabilities.health {
            self.state.max_health()
        } else {
            Attribute::Unsupported
        }
    }

    pub fn food_level(&self) -> Attribute<i64> {
        if self.capabilities.food {
            self.state.food_level()
        } else {
            Attribute::Unsupported
        }
    }

    pub fn experience_level(&self) -> Attribute<i64> {
        if self.capabilities.experience {
            self.state.experience_level()
        } else {
            Attribute::Unsupported
        }
    }

    pub fn game_mode(&self) -> Attribute<String> {
        if self.capabilities.game_mode {
            self.state.game_mode()
        } else {
            Attribute::Unsupported
        }
    }

    /// Live location when the platform has one, otherwise the last synced one.
    pub fn location(&self) -> Attribute<PlayerLocation> {
        if self.capabilities.location
            && let Attribute::Supported(loc) = self.state.location()
        {
            return Attribute::Supported(loc);
        }
        Attribute::from_option(self.last_location())
    }

    /// Health as a percentage of max health.
    pub fn health_percentage(&self) -> Attribute<f64> {
        match (self.health(), self.max_health()) {
            (Attribute::Supported(h), Attribute::Supported(max)) if max > 0.0 => {
                Attribute::Supported(h / max * 100.0)
            }
            _ => Attribute::Unsupported,
        }
    }

    /// At or below 20% of max health.
    pub fn is_low_health(&self) -> bool {
        self.health_percentage().supported().is_some_and(|p| p <= 20.0)
    }

    /// At or below 10% of max health.
    pub fn is_critical_health(&self) -> bool {
        self.health_percentage().supported().is_some_and(|p| p <= 10.0)
    }

    /// Food level at or below 6.
    pub fn is_hungry(&self) -> bool {
        self.food_level().supported().is_some_and(|f| f <= 6)
    }

    pub fn is_away(&self) -> bool {
        self.status.flag(StatusType::Away)
    }

    pub fn is_in_combat(&self) -> bool {
        self.status.flag(StatusType::Combat)
    }

    pub fn is_muted(&self) -> bool {
        self.status.flag(StatusType::Muted)
    }

    pub fn is_vanished(&self) -> bool {
        self.status.flag(StatusType::Vanished)
    }
}

impl fmt::Debug for OnlineUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnlineUser")
            .field("uuid", &self.identity.uuid)
            .field("username", &self.identity.username)
            .field("origin", &self.identity.origin)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_proto::StatusValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn live_user(snapshot: LiveSnapshot) -> (OnlineUser, Arc<LiveState>) {
        let live = Arc::new(LiveState::new(snapshot));
        let user = OnlineUser::new(
            Identity::new(Uuid::new_v4(), "Steve", "survival"),
            live.clone(),
            Arc::new(StatusCache::seeded(None)),
        );
        (user, live)
    }

    #[test]
    fn health_helpers() {
        let (user, live) = live_user(LiveSnapshot::default());
        assert_eq!(user.health_percentage(), Attribute::Supported(100.0));
        assert!(!user.is_low_health());

        live.update(|s| s.health = 4.0);
        assert!(user.is_low_health());
        assert!(!user.is_critical_health());

        live.update(|s| s.health = 2.0);
        assert!(user.is_critical_health());

        live.update(|s| s.food_level = 6);
        assert!(user.is_hungry());
    }

    #[test]
    fn console_supports_nothing() {
        let console = OnlineUser::console("proxy");
        assert!(console.is_console());
        assert_eq!(console.username(), CONSOLE_NAME);
        assert_eq!(console.health(), Attribute::Unsupported);
        assert_eq!(console.health_percentage(), Attribute::Unsupported);
        assert!(!console.is_low_health());
        assert!(!console.is_hungry());
    }

    #[test]
    fn bridged_sender() {
        let user = OnlineUser::bridged("discord", "alice#1");
        assert_eq!(user.identity().origin, "bridge:discord");
        assert!(!user.is_console());
        assert_eq!(user.game_mode(), Attribute::Unsupported);
    }

    #[test]
    fn cached_state_reads_replicated_values() {
        let cache = Arc::new(StatusCache::seeded(None));
        let user = OnlineUser::new(
            Identity::new(Uuid::new_v4(), "Alex", "proxy"),
            Arc::new(CachedState::new(cache.clone())),
            cache.clone(),
        );
        assert_eq!(user.health(), Attribute::Unsupported);
        cache
            .write(StatusType::Health.into(), StatusValue::Float(5.0), 1, None)
            .unwrap();
        cache
            .write(StatusType::MaxHealth.into(), StatusValue::Float(20.0), 1, None)
            .unwrap();
        assert_eq!(user.health_percentage(), Attribute::Supported(25.0));
        assert!(!user.is_low_health());
    }

    #[test]
    fn location_falls_back_to_last_synced() {
        let cache = Arc::new(StatusCache::seeded(None));
        let user = OnlineUser::new(
            Identity::new(Uuid::new_v4(), "Alex", "proxy"),
            Arc::new(CachedState::new(cache.clone())),
            cache,
        );
        assert_eq!(user.location(), Attribute::Unsupported);
        let loc = PlayerLocation::new("survival", "world", 1.0, 2.0, 3.0);
        assert_eq!(user.set_last_location(loc.clone()), None);
        assert_eq!(user.location(), Attribute::Supported(loc));
    }

    #[test]
    fn older_report_does_not_move_current_server() {
        let user = OnlineUser::console("proxy");
        assert!(user.observe_server("survival", 2000));
        assert!(!user.observe_server("lobby", 1000));
        assert_eq!(user.current_server().as_deref(), Some("survival"));
        assert!(user.observe_server("lobby", 2000));
        assert_eq!(user.current_server().as_deref(), Some("lobby"));
    }

    struct CountingProvider {
        negotiations: AtomicUsize,
    }

    impl StateProvider for CountingProvider {
        fn capabilities(&self) -> Capabilities {
            self.negotiations.fetch_add(1, Ordering::SeqCst);
            Capabilities::NONE
        }

        fn health(&self) -> Attribute<f64> {
            panic!("capability said unsupported");
        }
    }

    #[test]
    fn capabilities_negotiated_once() {
        let provider = Arc::new(CountingProvider {
            negotiations: AtomicUsize::new(0),
        });
        let user = OnlineUser::new(
            Identity::new(Uuid::new_v4(), "Bot", "test"),
            provider.clone(),
            Arc::new(StatusCache::with_runtime(None)),
        );
        for _ in 0..3 {
            assert_eq!(user.health(), Attribute::Unsupported);
        }
        assert_eq!(provider.negotiations.load(Ordering::SeqCst), 1);
    }
}
