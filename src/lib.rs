//! chatlink - cross-server player status sync and chat event core.
//!
//! A proxy and its backends each run one game thread for event dispatch and
//! a tokio runtime for links and timers. Status changes on a backend travel
//! to the proxy as JSON envelopes; the proxy applies them to its own caches
//! and tells listeners. [`ChatContext`] is the entry point for everything
//! else.

pub mod channels;
pub mod collab;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod game;
pub mod state;
pub mod sync;
pub mod telemetry;

pub use channels::{Channel, ChannelRegistry, SwitchCoordinator, SwitchOutcome};
pub use config::Config;
pub use context::{ChatContext, CommandOutcome, StatusOutcome};
pub use error::{ChatError, EventError, StatusError, SyncError};
pub use events::{EventBus, EventProvider, Priority};
pub use game::{GameFuture, GameHandle, GameThread};
pub use state::{Identity, OnlineUser, SessionRegistry, StatusCache};
pub use sync::{Role, SyncManager, SyncRouter};
