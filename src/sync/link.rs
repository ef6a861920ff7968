use chatlink_proto::frame::Frame;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;

/// State of one link to another process.
#[derive(Debug, Clone)]
pub struct LinkState {
    /// Outbound frame queue drained by the link task.
    pub tx: mpsc::Sender<Frame>,
    /// Name the peer announced (backends) or the fixed proxy link name.
    pub name: String,
    /// Remote socket address.
    pub addr: String,
    /// Time when the link was established.
    pub connected_at: Instant,
    /// Frames queued to this peer.
    pub frames_sent: Arc<AtomicU64>,
    /// Frames received from this peer.
    pub frames_recv: Arc<AtomicU64>,
}

impl LinkState {
    pub fn new(tx: mpsc::Sender<Frame>, name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            tx,
            name: name.into(),
            addr: addr.into(),
            connected_at: Instant::now(),
            frames_sent: Arc::new(AtomicU64::new(0)),
            frames_recv: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_recv(&self) {
        self.frames_recv.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.frames_recv.load(Ordering::Relaxed)
    }
}
