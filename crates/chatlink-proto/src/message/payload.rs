//! Typed readers for per-type envelope payloads.

use crate::error::{ProtoError, Result};
use crate::location::PlayerLocation;
use crate::status::StatusType;
use crate::value::{StatusValue, ValueKind};

use super::{MessageType, PlayerStatusMessage};

/// Payload of a `status_update`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Wire key as sent (may be an alias or a custom name).
    pub key: String,
    /// New value. [`StatusValue::Null`] clears.
    pub value: StatusValue,
    /// Free-form reason.
    pub reason: String,
}

impl StatusUpdate {
    /// Resolved status type; unknown keys are [`StatusType::Custom`].
    pub fn status_type(&self) -> StatusType {
        StatusType::from_key(&self.key)
    }
}

/// Payload of a `health_change`.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthChange {
    /// Health before the change.
    pub previous_health: f64,
    /// Health after the change.
    pub new_health: f64,
    /// Maximum health.
    pub max_health: f64,
    /// Reason name (`DAMAGE`, `REGENERATION`, ...); not interpreted here.
    pub reason: String,
}

/// Payload of a `location_change`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationChange {
    /// Where the player was.
    pub from: PlayerLocation,
    /// Where the player is now.
    pub to: PlayerLocation,
}

/// Payload of a `player_death`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDeath {
    /// Rendered death message.
    pub death_message: String,
    /// Killer name when another player was responsible.
    pub killer: Option<String>,
}

/// Payload of a `player_respawn`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRespawn {
    /// Respawn reason.
    pub reason: String,
}

/// Payload of a `command_execution`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandExecution {
    /// Command label without the slash.
    pub command: String,
    /// Arguments, split on whitespace.
    pub args: Vec<String>,
    /// `pre` or `post`.
    pub phase: String,
}

impl PlayerStatusMessage {
    fn expect_type(&self, expected: MessageType) -> Result<()> {
        if self.message_type == expected {
            Ok(())
        } else {
            Err(ProtoError::UnexpectedType {
                expected,
                actual: self.message_type,
            })
        }
    }

    fn require(&self, key: &'static str) -> Result<&StatusValue> {
        self.data.get(key).ok_or(ProtoError::MissingKey {
            message_type: self.message_type,
            key,
        })
    }

    fn require_str(&self, key: &'static str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| wrong_kind(key, ValueKind::Str, value))
    }

    fn require_f64(&self, key: &'static str) -> Result<f64> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| wrong_kind(key, ValueKind::Float, value))
    }

    /// Read a `status_update` payload.
    pub fn as_status_update(&self) -> Result<StatusUpdate> {
        self.expect_type(MessageType::StatusUpdate)?;
        Ok(StatusUpdate {
            key: self.require_str("status_type")?.to_owned(),
            value: self.require("value")?.clone(),
            reason: self.require_str("reason")?.to_owned(),
        })
    }

    /// Read a `health_change` payload. Integer values are widened.
    pub fn as_health_change(&self) -> Result<HealthChange> {
        self.expect_type(MessageType::HealthChange)?;
        Ok(HealthChange {
            previous_health: self.require_f64("previous_health")?,
            new_health: self.require_f64("new_health")?,
            max_health: self.require_f64("max_health")?,
            reason: self.require_str("reason")?.to_owned(),
        })
    }

    /// Read a `location_change` payload.
    pub fn as_location_change(&self) -> Result<LocationChange> {
        self.expect_type(MessageType::LocationChange)?;
        self.require_str("from_world")?;
        self.require_str("to_world")?;
        for key in ["from_x", "from_y", "from_z", "to_x", "to_y", "to_z"] {
            self.require_f64(key)?;
        }
        let from = PlayerLocation::read_prefixed("from", &self.server_name, &self.data);
        let to = PlayerLocation::read_prefixed("to", &self.server_name, &self.data);
        match (from, to) {
            (Some(from), Some(to)) => Ok(LocationChange { from, to }),
            _ => Err(ProtoError::MissingKey {
                message_type: self.message_type,
                key: "to_world",
            }),
        }
    }

    /// Read a `player_death` payload.
    pub fn as_player_death(&self) -> Result<PlayerDeath> {
        self.expect_type(MessageType::PlayerDeath)?;
        let killer = match self.data.get("killer") {
            None | Some(StatusValue::Null) => None,
            Some(StatusValue::Str(name)) if name.is_empty() => None,
            Some(StatusValue::Str(name)) => Some(name.clone()),
            Some(other) => return Err(wrong_kind("killer", ValueKind::Str, other)),
        };
        Ok(PlayerDeath {
            death_message: self.require_str("death_message")?.to_owned(),
            killer,
        })
    }

    /// Read a `player_respawn` payload.
    pub fn as_player_respawn(&self) -> Result<PlayerRespawn> {
        self.expect_type(MessageType::PlayerRespawn)?;
        Ok(PlayerRespawn {
            reason: self.require_str("reason")?.to_owned(),
        })
    }

    /// Read a `command_execution` payload.
    pub fn as_command_execution(&self) -> Result<CommandExecution> {
        self.expect_type(MessageType::CommandExecution)?;
        let args = self
            .require_str("args")?
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        Ok(CommandExecution {
            command: self.require_str("command")?.to_owned(),
            args,
            phase: self.require_str("phase")?.to_owned(),
        })
    }
}

fn wrong_kind(key: &str, expected: ValueKind, actual: &StatusValue) -> ProtoError {
    ProtoError::WrongKind {
        key: key.to_owned(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::*;
    use crate::message::MessageSubject;

    fn subject() -> MessageSubject {
        MessageSubject::new(Uuid::new_v4(), "Alex", "lobby")
    }

    #[test]
    fn status_update_reader() {
        let msg = PlayerStatusMessage::status_update(
            &subject(),
            "game_mode",
            StatusValue::from("CREATIVE"),
            "command",
        );
        let update = msg.as_status_update().unwrap();
        assert_eq!(update.status_type(), StatusType::GameMode);
        assert_eq!(update.value, StatusValue::from("CREATIVE"));
        assert_eq!(update.reason, "command");
    }

    #[test]
    fn health_accepts_integers() {
        let mut data = BTreeMap::new();
        data.insert("previous_health".to_owned(), StatusValue::Int(20));
        data.insert("new_health".to_owned(), StatusValue::Int(14));
        data.insert("max_health".to_owned(), StatusValue::Int(20));
        data.insert("reason".to_owned(), StatusValue::from("DAMAGE"));
        let msg = PlayerStatusMessage::new(MessageType::HealthChange, &subject(), data);
        let health = msg.as_health_change().unwrap();
        assert_eq!(health.new_health, 14.0);
    }

    #[test]
    fn health_rejects_strings() {
        let mut data = BTreeMap::new();
        data.insert("previous_health".to_owned(), StatusValue::from("twenty"));
        let msg = PlayerStatusMessage::new(MessageType::HealthChange, &subject(), data);
        let err = msg.as_health_change().unwrap_err();
        assert_eq!(err.error_code(), "wrong_kind");
    }

    #[test]
    fn wrong_reader_is_rejected() {
        let msg = PlayerStatusMessage::player_respawn(&subject(), "death");
        let err = msg.as_status_update().unwrap_err();
        assert_eq!(err.error_code(), "unexpected_type");
    }

    #[test]
    fn location_takes_server_from_envelope() {
        let from = PlayerLocation::new("ignored", "world", 0.0, 64.0, 0.0);
        let to = PlayerLocation::new("ignored", "world_nether", 1.0, 32.0, 1.0);
        let msg = PlayerStatusMessage::location_change(&subject(), &from, &to);
        let change = msg.as_location_change().unwrap();
        assert_eq!(change.from.server, "lobby");
        assert_eq!(change.to.world, "world_nether");
        assert_eq!(change.to.y, 32.0);
    }

    #[test]
    fn death_killer_is_optional() {
        let s = subject();
        let msg = PlayerStatusMessage::player_death(&s, "Alex was slain by Steve", Some("Steve"));
        assert_eq!(msg.as_player_death().unwrap().killer.as_deref(), Some("Steve"));
        let msg = PlayerStatusMessage::player_death(&s, "Alex fell", None);
        assert_eq!(msg.as_player_death().unwrap().killer, None);
    }

    #[test]
    fn command_args_split() {
        let args = vec!["Steve".to_owned(), "hello".to_owned(), "there".to_owned()];
        let msg = PlayerStatusMessage::command_execution(&subject(), "msg", &args, "post");
        let cmd = msg.as_command_execution().unwrap();
        assert_eq!(cmd.command, "msg");
        assert_eq!(cmd.args, args);
        assert_eq!(cmd.phase, "post");

        let msg = PlayerStatusMessage::command_execution(&subject(), "list", &[], "pre");
        assert!(msg.as_command_execution().unwrap().args.is_empty());
    }
}
