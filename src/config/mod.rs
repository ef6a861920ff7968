//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct, server identity and loading
//! - [`sync`]: Status sync link configuration (SyncConfig)
//! - [`channels`]: Channel blocks and chat rules (ChannelBlock, ChatConfig)
//! - [`validation`]: Startup checks returning every problem found

mod channels;
mod defaults;
mod sync;
mod types;
pub mod validation;

pub use channels::{ChannelBlock, ChatConfig};
pub use sync::SyncConfig;
pub use types::{Config, ConfigError, ServerConfig};
pub use validation::{ValidationError, validate};
