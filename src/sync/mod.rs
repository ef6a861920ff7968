//! Sync Module - cross-server status synchronization.
//!
//! One proxy links to any number of backends. Each link carries status
//! envelopes on a single logical channel; the router applies what arrives
//! and the manager queues what leaves.

pub mod handshake;
pub mod link;
pub mod manager;
pub mod network;
pub mod resync;
pub mod router;

pub use link::LinkState;
pub use manager::{PROXY_LINK, Role, SyncManager};
pub use network::{LinkOptions, connect_to_proxy, start_listener};
pub use resync::start_resync;
pub use router::{SyncRouter, accepts, snapshot_of};
