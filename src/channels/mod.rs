//! Chat channels: definitions, membership queries and switching.

mod registry;
mod switch;

pub use registry::{Channel, ChannelRegistry};
pub use switch::{SwitchCoordinator, SwitchOutcome};
