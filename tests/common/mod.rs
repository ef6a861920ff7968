//! Integration test common infrastructure.
//!
//! Builds in-process proxy and backend nodes and records the events and
//! deliveries they produce.

use std::sync::Arc;
use std::time::Duration;

use chatlink::collab::MessageSink;
use chatlink::config::ChatConfig;
use chatlink::events::{Event, EventBus, EventProvider};
use chatlink::game::GameThread;
use chatlink::state::{Identity, InMemoryMembership, LiveSnapshot, LiveState, SessionRegistry};
use chatlink::sync::{Role, SyncRouter};
use chatlink::{Channel, ChannelRegistry, ChatContext, OnlineUser, SyncManager};
use parking_lot::Mutex;
use uuid::Uuid;

/// Sink that keeps every delivered line.
#[derive(Default)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<(String, String)>>,
}

impl MessageSink for RecordingSink {
    fn deliver(&self, recipient: &OnlineUser, text: &str) {
        self.lines
            .lock()
            .push((recipient.username().to_owned(), text.to_owned()));
    }
}

/// One process of the topology.
pub struct TestNode {
    _game: GameThread,
    pub bus: Arc<EventBus>,
    pub ctx: ChatContext,
    pub router: SyncRouter,
    pub sink: Arc<RecordingSink>,
}

impl TestNode {
    /// Must be called inside a tokio runtime so status expiry works.
    pub fn new(role: Role, name: &str) -> Self {
        let game = GameThread::spawn(&format!("{name}-game")).expect("spawn game thread");
        let bus = Arc::new(EventBus::new());
        let events = EventProvider::new(bus.clone(), game.handle());
        let sessions = Arc::new(SessionRegistry::new(
            tokio::runtime::Handle::try_current().ok(),
            events.clone(),
        ));
        let channels = Arc::new(ChannelRegistry::new(
            vec![Channel::new("global", "Global"), Channel::new("staff", "Staff")],
            "global",
            Arc::new(InMemoryMembership::new()),
        ));
        let manager = SyncManager::new(role, name, chatlink_proto::STATUS_CHANNEL, 64);
        let sink = Arc::new(RecordingSink::default());
        let ctx = ChatContext::new(sessions, events, channels, manager, ChatConfig::default())
            .with_sink(sink.clone());
        let router = ctx.router();
        Self {
            _game: game,
            bus,
            ctx,
            router,
            sink,
        }
    }

    /// Open a session for `uuid`: cached on a proxy, live on a backend.
    pub fn open(&self, uuid: Uuid, name: &str) -> Arc<OnlineUser> {
        let sync = self.ctx.sync();
        let identity = Identity::new(uuid, name, &*sync.local_name);
        match sync.role {
            Role::Proxy => self.ctx.sessions().open_cached(identity),
            Role::Backend => self
                .ctx
                .sessions()
                .open(identity, Arc::new(LiveState::new(LiveSnapshot::default()))),
        }
    }

    /// Keep a clone of every `E` dispatched from now on, with its final
    /// cancelled flag.
    pub fn record<E: Event + Clone>(&self) -> Arc<Mutex<Vec<(E, bool)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        self.bus.monitor::<E, _>("test-recorder", move |event, cancelled| {
            sink.lock().push((event.clone(), cancelled));
            Ok(())
        });
        log
    }

    /// Resolves once every game task queued before it has run.
    pub async fn settle(&self) {
        self.ctx
            .events()
            .game()
            .call(|| ())
            .await
            .expect("game thread alive");
    }
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually<F>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
