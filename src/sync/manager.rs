use std::sync::Arc;

use chatlink_proto::frame::Frame;
use chatlink_proto::{MessageSubject, PlayerStatusMessage};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::state::OnlineUser;
use crate::sync::link::LinkState;

/// Name a backend files its single link under.
pub const PROXY_LINK: &str = "proxy";

/// Which end of the topology this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Proxy,
    Backend,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Proxy => "proxy",
            Self::Backend => "backend",
        })
    }
}

/// Owns the links of this process and every outbound envelope.
///
/// Sends never block: frames go through bounded per-link queues and are
/// dropped with a warning when a queue is full.
#[derive(Clone)]
pub struct SyncManager {
    pub role: Role,
    pub local_name: String,
    /// Logical channel status envelopes travel on.
    pub channel: String,
    pub queue_capacity: usize,
    /// Live links by peer name.
    pub links: Arc<DashMap<String, LinkState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SyncManager {
    pub fn new(role: Role, local_name: impl Into<String>, channel: impl Into<String>, queue_capacity: usize) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            role,
            local_name: local_name.into(),
            channel: channel.into(),
            queue_capacity: queue_capacity.max(1),
            links: Arc::new(DashMap::new()),
            shutdown_tx,
        }
    }

    /// Record a link and return the receiving end of its outbound queue.
    /// An existing link under the same name is replaced; its task sees its
    /// queue close and exits.
    pub fn register_link(&self, name: &str, addr: &str) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        if self
            .links
            .insert(name.to_owned(), LinkState::new(tx, name, addr))
            .is_some()
        {
            warn!(peer = %name, "Replacing existing link");
        }
        info!(peer = %name, addr = %addr, "Link registered");
        rx
    }

    /// Forget a link, but only if it is still the one created at
    /// `connected_at`.
    pub fn remove_link(&self, name: &str, connected_at: std::time::Instant) {
        if self
            .links
            .remove_if(name, |_, link| link.connected_at == connected_at)
            .is_some()
        {
            info!(peer = %name, "Link removed");
        }
    }

    pub fn link_names(&self) -> Vec<String> {
        self.links.iter().map(|l| l.key().clone()).collect()
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    /// Subject for envelopes this process emits about `player`.
    pub fn subject_for(&self, player: &OnlineUser) -> MessageSubject {
        MessageSubject::new(player.uuid(), player.username(), &*self.local_name)
    }

    /// Queue `msg` to one peer.
    pub fn send_to(&self, peer: &str, msg: &PlayerStatusMessage) -> Result<(), SyncError> {
        let frame = Frame::envelope(&self.channel, msg)?;
        let link = self
            .links
            .get(peer)
            .ok_or_else(|| SyncError::NoLink(peer.to_owned()))?;
        match link.tx.try_send(frame) {
            Ok(()) => {
                link.frames_sent
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(peer = %peer, kind = %msg.message_type(), "Envelope queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(peer = %peer, kind = %msg.message_type(), "Send queue full, dropping envelope");
                Err(SyncError::QueueFull(peer.to_owned()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SyncError::NoLink(peer.to_owned())),
        }
    }

    /// Queue `msg` to the proxy (backend role).
    pub fn send_to_proxy(&self, msg: &PlayerStatusMessage) -> Result<(), SyncError> {
        self.send_to(PROXY_LINK, msg)
    }

    /// Queue `msg` to every link. Returns how many accepted it.
    pub fn broadcast(&self, msg: &PlayerStatusMessage) -> usize {
        let peers = self.link_names();
        peers
            .iter()
            .filter(|peer| self.send_to(peer, msg).is_ok())
            .count()
    }

    /// Send `msg` in the direction this role emits: backends to the proxy,
    /// the proxy to every backend. Failures are logged, never returned.
    pub fn publish(&self, msg: &PlayerStatusMessage) {
        match self.role {
            Role::Backend => {
                if let Err(e) = self.send_to_proxy(msg) {
                    debug!(error = %e, code = e.error_code(), "Envelope not published");
                }
            }
            Role::Proxy => {
                self.broadcast(msg);
            }
        }
    }

    /// Ask the backend `player` is on for a full status snapshot.
    pub fn request_sync(&self, player: &OnlineUser) -> Result<(), SyncError> {
        let server = player
            .current_server()
            .ok_or_else(|| SyncError::NoLink(format!("{} has no current server", player.username())))?;
        let msg = PlayerStatusMessage::sync_request(&self.subject_for(player));
        self.send_to(&server, &msg)
    }

    /// Signal every link and listener task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}
