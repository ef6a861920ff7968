//! Telemetry utilities for dispatch timing and span construction.

use std::time::Instant;

/// Guard timing one event dispatch. Logs the latency when dropped.
pub struct DispatchTimer {
    event: &'static str,
    start: Instant,
}

impl DispatchTimer {
    /// Start timing a dispatch of `event`.
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            start: Instant::now(),
        }
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        let micros = self.start.elapsed().as_micros() as u64;
        tracing::trace!(event = self.event, micros, "Dispatch finished");
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};
    use uuid::Uuid;

    /// Span for one link between processes.
    pub fn link(peer: &str, addr: &str) -> Span {
        info_span!("link", peer = %peer, addr = %addr)
    }

    /// Span for one event dispatch.
    pub fn dispatch(event: &'static str) -> Span {
        debug_span!("dispatch", event = event)
    }

    /// Span for work on behalf of one player session.
    pub fn session(uuid: Uuid, name: &str) -> Span {
        debug_span!("session", uuid = %uuid, name = %name)
    }
}
