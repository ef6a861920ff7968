//! Error types for the status protocol.
//!
//! Decoding failures are split by layer: malformed JSON, an envelope whose
//! payload lacks a key its message type requires, or a payload value of the
//! wrong primitive kind.

use thiserror::Error;

use crate::message::MessageType;
use crate::value::ValueKind;

/// Convenience type alias for Results using [`ProtoError`].
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// I/O error during reading or writing a framed link.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload was not valid envelope JSON.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope payload lacks a key required by its message type.
    #[error("{message_type} payload missing key '{key}'")]
    MissingKey {
        /// Message type of the envelope.
        message_type: MessageType,
        /// The key that was absent.
        key: &'static str,
    },

    /// Payload value carried a kind other than the one expected.
    #[error("payload key '{key}' expected {expected}, got {actual}")]
    WrongKind {
        /// The offending key.
        key: String,
        /// Kind the reader asked for.
        expected: ValueKind,
        /// Kind that was on the wire.
        actual: ValueKind,
    },

    /// Accessor called on an envelope of a different message type.
    #[error("expected {expected} envelope, got {actual}")]
    UnexpectedType {
        /// Type the accessor decodes.
        expected: MessageType,
        /// Type of the envelope.
        actual: MessageType,
    },

    /// A framed line was not UTF-8 or not of the form `<channel> <payload>`.
    #[error("line error: {0}")]
    Line(String),

    /// A framed line exceeded the codec's maximum length.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Observed length.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },
}

impl ProtoError {
    /// Static label for log fields and counters.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Json(_) => "malformed",
            Self::MissingKey { .. } => "missing_key",
            Self::WrongKind { .. } => "wrong_kind",
            Self::UnexpectedType { .. } => "unexpected_type",
            Self::Line(_) => "line",
            Self::LineTooLong { .. } => "line_too_long",
        }
    }

    /// Whether a link can keep reading after this error. Only I/O failures
    /// leave the stream unusable.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = ProtoError::MissingKey {
            message_type: MessageType::HealthChange,
            key: "new_health",
        };
        assert_eq!(err.error_code(), "missing_key");
        assert_eq!(
            err.to_string(),
            "health_change payload missing key 'new_health'"
        );
    }
}
