//! Unified error handling for chatlink.
//!
//! Every failure in the core degrades to "skip and log"; these enums exist so
//! that callers and log lines can tell the failure modes apart.

use chatlink_proto::{ProtoError, StatusType, ValueKind};
use thiserror::Error;

// ============================================================================
// Status errors (cache writes)
// ============================================================================

/// Status cache write failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Value kind does not match the kind the status type declares.
    #[error("{status} expects {expected}, got {actual}")]
    InvalidValue {
        status: StatusType,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// No session for the player on this process.
    #[error("no local session for player {0}")]
    UnknownPlayer(uuid::Uuid),
}

impl StatusError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "invalid_value",
            Self::UnknownPlayer(_) => "unknown_player",
        }
    }
}

// ============================================================================
// Event errors (dispatch and game-thread crossing)
// ============================================================================

/// Errors surfaced by the event provider and game-thread futures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A blocking wait was attempted on the game thread, which is the only
    /// thread able to complete it.
    #[error("blocking wait on the game thread would deadlock")]
    WouldDeadlock,

    /// The game thread stopped before the task ran.
    #[error("game thread is not running")]
    GameThreadGone,
}

impl EventError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::WouldDeadlock => "would_deadlock",
            Self::GameThreadGone => "game_thread_gone",
        }
    }
}

// ============================================================================
// Sync errors (links and envelope emission)
// ============================================================================

/// Status sync channel errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound queue for a link is full; the frame was dropped.
    #[error("send queue to {0} is full")]
    QueueFull(String),

    /// No link to the named server.
    #[error("no link to server {0}")]
    NoLink(String),

    /// Link handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

impl SyncError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Proto(e) => e.error_code(),
            Self::Io(_) => "io",
            Self::QueueFull(_) => "queue_full",
            Self::NoLink(_) => "no_link",
            Self::Handshake(_) => "handshake",
        }
    }
}

// ============================================================================
// Chat errors (sends refused before delivery)
// ============================================================================

/// Why a chat action was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("unknown channel {0}")]
    UnknownChannel(String),

    #[error("missing permission {0}")]
    NoPermission(String),

    #[error("sender is muted")]
    Muted,

    #[error("chat in {0} is restricted during combat")]
    InCombat(String),

    #[error("chat in {0} is restricted at critical health")]
    CriticalHealth(String),

    /// A filter listener blocked the message outright.
    #[error("blocked by {filter}: {reason}")]
    Blocked { filter: String, reason: String },

    /// A listener cancelled the send.
    #[error("cancelled by a listener")]
    Cancelled,

    #[error("no recipient is online")]
    NoRecipients,
}

impl ChatError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownChannel(_) => "unknown_channel",
            Self::NoPermission(_) => "no_permission",
            Self::Muted => "muted",
            Self::InCombat(_) => "in_combat",
            Self::CriticalHealth(_) => "critical_health",
            Self::Blocked { .. } => "blocked",
            Self::Cancelled => "cancelled",
            Self::NoRecipients => "no_recipients",
        }
    }
}
