//! Listener registry and synchronous dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{error, trace, warn};

use super::{Cancellable, Event};

/// Listener priority tier. Lower tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

impl Priority {
    fn rank(self) -> u8 {
        self as u8
    }
}

/// Monitor listeners run after every priority tier.
const MONITOR_RANK: u8 = Priority::Highest as u8 + 1;

/// Handle returned by registration; pass to [`EventBus::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a mutating listener sees: the event and the cancellation flag.
pub struct EventContext<'a, E> {
    event: &'a mut E,
    cancelled: &'a mut bool,
}

impl<E> EventContext<'_, E> {
    pub fn event(&self) -> &E {
        self.event
    }

    pub fn event_mut(&mut self) -> &mut E {
        self.event
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled
    }
}

impl<E: Cancellable> EventContext<'_, E> {
    pub fn cancel(&mut self) {
        *self.cancelled = true;
    }

    /// Set or clear cancellation. A later listener may un-cancel.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        *self.cancelled = cancelled;
    }
}

/// Outcome of a dispatch.
///
/// Dispatch is single-shot: nothing is rolled back, and `cancelled` only
/// tells the caller whether to go ahead with the action.
#[derive(Debug, Clone)]
pub struct Dispatched<E> {
    pub event: E,
    pub cancelled: bool,
}

impl<E> Dispatched<E> {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn into_event(self) -> E {
        self.event
    }
}

type MutatingFn<E> = Box<dyn Fn(&mut EventContext<'_, E>) -> anyhow::Result<()> + Send + Sync>;
type MonitorFn<E> = Box<dyn Fn(&E, bool) -> anyhow::Result<()> + Send + Sync>;

enum Handler<E> {
    Mutating(MutatingFn<E>),
    /// Read-only view plus the final cancellation state.
    Monitor(MonitorFn<E>),
}

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    rank: u8,
    name: Arc<str>,
    /// Always a `Handler<E>` for the `TypeId` it is filed under.
    handler: Arc<dyn Any + Send + Sync>,
}

/// Typed listener registry.
///
/// Per-event lists are copy-on-write, so a listener may register or
/// unregister others while a dispatch is running.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<TypeId, Arc<Vec<Registration>>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener that may rewrite the event and, for cancellable
    /// events, cancel it.
    pub fn register<E, F>(&self, priority: Priority, name: &str, listener: F) -> ListenerId
    where
        E: Event,
        F: Fn(&mut EventContext<'_, E>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler<E> = Handler::Mutating(Box::new(listener));
        self.insert::<E>(priority.rank(), name, handler)
    }

    /// Register a read-only listener. Monitors run last and see whether the
    /// event ended up cancelled.
    pub fn monitor<E, F>(&self, name: &str, listener: F) -> ListenerId
    where
        E: Event,
        F: Fn(&E, bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler<E> = Handler::Monitor(Box::new(listener));
        self.insert::<E>(MONITOR_RANK, name, handler)
    }

    fn insert<E: Event>(&self, rank: u8, name: &str, handler: Handler<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Registration {
            id,
            rank,
            name: Arc::from(name),
            handler: Arc::new(handler),
        };
        let mut listeners = self.listeners.write();
        let slot = listeners.entry(TypeId::of::<E>()).or_default();
        let mut updated = Vec::with_capacity(slot.len() + 1);
        updated.extend(slot.iter().cloned());
        updated.push(registration);
        updated.sort_by_key(|r| (r.rank, r.id.0));
        *slot = Arc::new(updated);
        trace!(event = E::NAME, listener = name, "Listener registered");
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        for slot in listeners.values_mut() {
            if slot.iter().any(|r| r.id == id) {
                let updated: Vec<_> = slot.iter().filter(|r| r.id != id).cloned().collect();
                *slot = Arc::new(updated);
                return true;
            }
        }
        false
    }

    /// Number of listeners registered for `E`.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, |l| l.len())
    }

    /// Run every listener for `E` in order on the calling thread.
    ///
    /// A listener that returns an error or panics is logged and skipped;
    /// the rest still run.
    pub fn dispatch<E: Event>(&self, event: E) -> Dispatched<E> {
        let registrations = self.listeners.read().get(&TypeId::of::<E>()).cloned();
        let mut event = event;
        let mut cancelled = false;

        for registration in registrations.iter().flat_map(|r| r.iter()) {
            let Some(handler) = registration.handler.downcast_ref::<Handler<E>>() else {
                continue;
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| match handler {
                Handler::Mutating(f) => f(&mut EventContext {
                    event: &mut event,
                    cancelled: &mut cancelled,
                }),
                Handler::Monitor(f) => f(&event, cancelled),
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(event = E::NAME, listener = %registration.name, error = %e, "Listener failed");
                }
                Err(_) => {
                    error!(event = E::NAME, listener = %registration.name, "Listener panicked");
                }
            }
        }

        Dispatched { event, cancelled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    struct Ping(String);
    impl Event for Ping {
        const NAME: &'static str = "ping";
    }
    impl Cancellable for Ping {}

    #[derive(Debug, Clone)]
    struct Notice;
    impl Event for Notice {
        const NAME: &'static str = "notice";
    }

    #[test]
    fn tiers_then_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let push = |label: &'static str| {
            let order = order.clone();
            move |_: &mut EventContext<'_, Ping>| {
                order.lock().push(label);
                Ok(())
            }
        };
        bus.register(Priority::High, "h", push("high"));
        bus.register(Priority::Lowest, "l1", push("lowest-1"));
        bus.register(Priority::Normal, "n", push("normal"));
        bus.register(Priority::Lowest, "l2", push("lowest-2"));
        let o = order.clone();
        bus.monitor::<Ping, _>("m", move |_, _| {
            o.lock().push("monitor");
            Ok(())
        });
        bus.register(Priority::Highest, "hh", push("highest"));

        bus.dispatch(Ping("x".into()));
        assert_eq!(
            *order.lock(),
            vec!["lowest-1", "lowest-2", "normal", "high", "highest", "monitor"]
        );
    }

    #[test]
    fn cancel_and_rewrite() {
        let bus = EventBus::new();
        bus.register::<Ping, _>(Priority::Normal, "rewrite", |ctx| {
            ctx.event_mut().0 = "rewritten".into();
            ctx.cancel();
            Ok(())
        });
        let out = bus.dispatch(Ping("orig".into()));
        assert!(out.is_cancelled());
        assert_eq!(out.event.0, "rewritten");
    }

    #[test]
    fn later_tier_can_uncancel() {
        let bus = EventBus::new();
        bus.register::<Ping, _>(Priority::Low, "cancel", |ctx| {
            ctx.cancel();
            Ok(())
        });
        bus.register::<Ping, _>(Priority::High, "restore", |ctx| {
            assert!(ctx.is_cancelled());
            ctx.set_cancelled(false);
            Ok(())
        });
        assert!(!bus.dispatch(Ping(String::new())).cancelled);
    }

    #[test]
    fn monitor_sees_final_state() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        bus.register::<Ping, _>(Priority::Highest, "cancel", |ctx| {
            ctx.cancel();
            Ok(())
        });
        let s = seen.clone();
        bus.monitor::<Ping, _>("watch", move |ev, cancelled| {
            *s.lock() = Some((ev.0.clone(), cancelled));
            Ok(())
        });
        bus.dispatch(Ping("hi".into()));
        assert_eq!(*seen.lock(), Some(("hi".to_owned(), true)));
    }

    #[test]
    fn failures_and_panics_are_isolated() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(0));
        bus.register::<Notice, _>(Priority::Low, "errs", |_| anyhow::bail!("nope"));
        bus.register::<Notice, _>(Priority::Normal, "panics", |_| panic!("listener bug"));
        let r = reached.clone();
        bus.register::<Notice, _>(Priority::High, "survivor", move |_| {
            *r.lock() += 1;
            Ok(())
        });
        let out = bus.dispatch(Notice);
        assert!(!out.cancelled);
        assert_eq!(*reached.lock(), 1);
    }

    #[test]
    fn unregister_removes_listener() {
        let bus = EventBus::new();
        let id = bus.register::<Notice, _>(Priority::Normal, "x", |_| Ok(()));
        assert_eq!(bus.listener_count::<Notice>(), 1);
        assert!(bus.unregister(id));
        assert!(!bus.unregister(id));
        assert_eq!(bus.listener_count::<Notice>(), 0);
        assert_eq!(bus.listener_count::<Ping>(), 0);
    }

    #[test]
    fn listeners_are_per_type() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        bus.register::<Ping, _>(Priority::Normal, "ping", move |_| {
            *h.lock() += 1;
            Ok(())
        });
        bus.dispatch(Notice);
        assert_eq!(*hits.lock(), 0);
        bus.dispatch(Ping(String::new()));
        assert_eq!(*hits.lock(), 1);
    }
}
