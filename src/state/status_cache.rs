//! Per-player status cache.
//!
//! Every key moves through `absent -> present(v) -> present(v') -> absent`.
//! Writes carry the emitter's wall-clock timestamp and only land when that
//! timestamp is at least the cached one, so replicas converge on the newest
//! write regardless of arrival order.
//!
//! Reads and writes are safe from any thread without caller locking.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chatlink_proto::{StatusType, StatusValue};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{trace, warn};

use crate::error::StatusError;

/// Seeded into every new session, at timestamp 0 so any real write wins.
pub const DEFAULT_STATUSES: &[(StatusType, bool)] = &[
    (StatusType::Away, false),
    (StatusType::Combat, false),
    (StatusType::Muted, false),
    (StatusType::Busy, false),
    (StatusType::Vanished, false),
];

/// Cache key: a known status type, or a named custom attribute.
///
/// Custom attributes keep their wire name so that distinct unknown keys
/// never overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKey {
    Known(StatusType),
    Custom(String),
}

impl StatusKey {
    /// Resolve a wire key (aliases included). Unknown keys become `Custom`.
    pub fn from_wire(key: &str) -> Self {
        match StatusType::from_key(key) {
            StatusType::Custom => Self::Custom(key.to_owned()),
            known => Self::Known(known),
        }
    }

    /// Key as written to the wire.
    pub fn wire_key(&self) -> &str {
        match self {
            Self::Known(st) => st.key(),
            Self::Custom(name) => name,
        }
    }

    /// Status type this key belongs to.
    pub fn status_type(&self) -> StatusType {
        match self {
            Self::Known(st) => *st,
            Self::Custom(_) => StatusType::Custom,
        }
    }

    /// Check `value` against the declared kind.
    pub fn check(&self, value: &StatusValue) -> Result<(), StatusError> {
        let status = self.status_type();
        if status.is_valid_value(Some(value)) {
            Ok(())
        } else {
            Err(StatusError::InvalidValue {
                status,
                expected: status.value_kind(),
                actual: value.kind(),
            })
        }
    }
}

impl From<StatusType> for StatusKey {
    fn from(st: StatusType) -> Self {
        match st {
            StatusType::Custom => Self::Custom(st.key().to_owned()),
            known => Self::Known(known),
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

/// Result of a successful-looking write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write landed. `previous` is the value it replaced.
    Applied { previous: Option<StatusValue> },
    /// A newer write was already cached; nothing changed.
    Stale { cached_at: i64 },
}

impl WriteOutcome {
    /// Whether the cache changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Called once per expired key with the value that was removed.
pub type ExpireHook = Arc<dyn Fn(StatusKey, StatusValue) + Send + Sync>;

struct Entry {
    /// `None` after a Null write: cleared, but the timestamp still guards
    /// against older writes.
    value: Option<StatusValue>,
    timestamp: i64,
    generation: u64,
    timer: Option<AbortHandle>,
}

impl Entry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Thread-safe typed key/value store for one player.
pub struct StatusCache {
    entries: DashMap<StatusKey, Entry>,
    generation: AtomicU64,
    runtime: Option<Handle>,
    on_expire: RwLock<Option<ExpireHook>>,
}

impl StatusCache {
    /// Empty cache. Expiry timers use the tokio runtime current at
    /// construction, if any.
    pub fn new() -> Self {
        Self::with_runtime(Handle::try_current().ok())
    }

    /// Empty cache whose expiry timers run on `runtime`.
    pub fn with_runtime(runtime: Option<Handle>) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            runtime,
            on_expire: RwLock::new(None),
        }
    }

    /// Cache seeded from [`DEFAULT_STATUSES`].
    pub fn seeded(runtime: Option<Handle>) -> Self {
        let cache = Self::with_runtime(runtime);
        for (status, value) in DEFAULT_STATUSES {
            cache.entries.insert(
                StatusKey::Known(*status),
                Entry {
                    value: Some(StatusValue::Bool(*value)),
                    timestamp: 0,
                    generation: cache.next_generation(),
                    timer: None,
                },
            );
        }
        cache
    }

    /// Install the hook invoked when a key expires.
    pub fn set_expire_hook(&self, hook: ExpireHook) {
        *self.on_expire.write() = Some(hook);
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current value for `key`.
    pub fn get(&self, key: &StatusKey) -> Option<StatusValue> {
        self.entries.get(key).and_then(|e| e.value.clone())
    }

    /// Current value for a known status type.
    pub fn get_status(&self, status: StatusType) -> Option<StatusValue> {
        self.get(&StatusKey::from(status))
    }

    /// Boolean flag, `false` when absent or not a bool.
    pub fn flag(&self, status: StatusType) -> bool {
        self.get_status(status)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Timestamp of the last write to `key`, including Null writes.
    pub fn timestamp(&self, key: &StatusKey) -> Option<i64> {
        self.entries.get(key).map(|e| e.timestamp)
    }

    /// Whether `key` currently holds a value.
    pub fn contains(&self, key: &StatusKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.value.is_some())
    }

    /// Write `value` stamped `timestamp`.
    ///
    /// A value of the wrong kind is rejected and nothing changes. A write
    /// older than the cached one is [`WriteOutcome::Stale`]. Writing
    /// [`StatusValue::Null`] clears the value. A pending expiry on the key is
    /// cancelled by any applied write; `expiry` arms a new one.
    pub fn write(
        self: &Arc<Self>,
        key: StatusKey,
        value: StatusValue,
        timestamp: i64,
        expiry: Option<Duration>,
    ) -> Result<WriteOutcome, StatusError> {
        key.check(&value)?;

        let generation = self.next_generation();
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            value: None,
            timestamp: i64::MIN,
            generation: 0,
            timer: None,
        });

        if timestamp < entry.timestamp {
            trace!(key = %key, cached_at = entry.timestamp, timestamp, "Stale status write ignored");
            return Ok(WriteOutcome::Stale {
                cached_at: entry.timestamp,
            });
        }

        entry.cancel_timer();
        let previous = entry.value.take();
        let cleared = value.is_null();
        entry.value = (!cleared).then_some(value);
        entry.timestamp = timestamp;
        entry.generation = generation;

        if let Some(after) = expiry.filter(|_| !cleared) {
            entry.timer = self.arm_expiry(key.clone(), generation, after);
        }

        Ok(WriteOutcome::Applied { previous })
    }

    fn arm_expiry(self: &Arc<Self>, key: StatusKey, generation: u64, after: Duration) -> Option<AbortHandle> {
        let Some(runtime) = self.runtime.as_ref() else {
            warn!(key = %key, "No runtime for status expiry; value will not expire");
            return None;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(cache) = weak.upgrade() {
                cache.expire(&key, generation);
            }
        });
        Some(task.abort_handle())
    }

    /// Remove `key` if it is still the write that armed this timer.
    fn expire(&self, key: &StatusKey, generation: u64) {
        let removed = self
            .entries
            .remove_if(key, |_, e| e.generation == generation)
            .and_then(|(_, e)| e.value);
        let Some(value) = removed else {
            return;
        };
        trace!(key = %key, "Status expired");
        let hook = self.on_expire.read().clone();
        if let Some(hook) = hook {
            hook(key.clone(), value);
        }
    }

    /// Remove `key`, cancelling its expiry. Returns the value it held.
    pub fn remove(&self, key: &StatusKey) -> Option<StatusValue> {
        self.entries.remove(key).and_then(|(_, mut e)| {
            e.cancel_timer();
            e.value
        })
    }

    /// Flat snapshot of every present value, keyed by wire key.
    pub fn snapshot(&self) -> BTreeMap<String, StatusValue> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.value
                    .as_ref()
                    .map(|v| (e.key().wire_key().to_owned(), v.clone()))
            })
            .collect()
    }

    /// Drop everything and cancel all pending expiries.
    pub fn clear(&self) {
        for mut entry in self.entries.iter_mut() {
            entry.cancel_timer();
        }
        self.entries.clear();
    }

    /// Number of keys with a present value.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_some()).count()
    }

    /// Whether no key holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}
