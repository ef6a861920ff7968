//! # chatlink-proto
//!
//! Wire protocol shared by every process in a chatlink topology: one proxy
//! fronting any number of backend game servers.
//!
//! ## Features
//!
//! - Typed player status attributes ([`StatusType`]) with declared value kinds
//! - Kind-tagged primitive values ([`StatusValue`]) that survive a JSON round trip
//! - Immutable status envelopes ([`PlayerStatusMessage`]) with per-type payload accessors
//! - Player locations and the `location_change` payload layout
//! - Optional Tokio line framing ([`frame::FrameCodec`]) for links between processes

#![deny(clippy::all)]
#![warn(missing_docs)]

//! ## Quick Start
//!
//! ```rust
//! use chatlink_proto::{MessageSubject, PlayerStatusMessage, StatusType, StatusValue};
//! use uuid::Uuid;
//!
//! let subject = MessageSubject::new(Uuid::new_v4(), "Steve", "lobby");
//! let msg = PlayerStatusMessage::status_update(
//!     &subject,
//!     StatusType::Away.key(),
//!     StatusValue::Bool(true),
//!     "afk timer",
//! );
//!
//! let wire = chatlink_proto::encode(&msg).expect("encodable");
//! let back = chatlink_proto::decode(&wire).expect("decodable");
//! assert_eq!(back, msg);
//! ```

pub mod error;
#[cfg(feature = "tokio")]
pub mod frame;
#[cfg(feature = "tokio")]
pub mod line;
pub mod location;
pub mod message;
pub mod status;
pub mod value;

pub use self::error::{ProtoError, Result};
pub use self::location::PlayerLocation;
pub use self::message::{
    decode, encode, CommandExecution, HealthChange, LocationChange, MessageSubject, MessageType,
    PlayerDeath, PlayerRespawn, PlayerStatusMessage, StatusUpdate,
};
pub use self::status::StatusType;
pub use self::value::{StatusValue, ValueKind};

/// Logical channel carrying status envelopes between processes.
pub const STATUS_CHANNEL: &str = "chatlink:player_status";

/// Logical channel used once per link for the backend hello.
pub const LINK_CHANNEL: &str = "chatlink:link";

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
