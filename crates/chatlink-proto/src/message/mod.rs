//! Status envelopes.
//!
//! A [`PlayerStatusMessage`] is the single unit exchanged on the status
//! channel. It names a player, the emitting server, a wall-clock timestamp
//! and a flat map of tagged values whose required keys depend on the
//! [`MessageType`]. Envelopes are immutable once built; the typed readers in
//! [`payload`] check the required keys on the way out.

mod payload;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::location::PlayerLocation;
use crate::value::StatusValue;

pub use self::payload::{
    CommandExecution, HealthChange, LocationChange, PlayerDeath, PlayerRespawn, StatusUpdate,
};

/// Routing discriminator of an envelope.
///
/// Any wire name this crate does not know decodes to [`MessageType::Unknown`]
/// instead of failing, so that newer peers do not break older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// A single status key changed.
    StatusUpdate,
    /// Health changed.
    HealthChange,
    /// Player moved across worlds or a large distance.
    LocationChange,
    /// Player died.
    PlayerDeath,
    /// Player respawned.
    PlayerRespawn,
    /// A chat command ran on a backend.
    CommandExecution,
    /// Proxy asks a backend for a full snapshot.
    SyncRequest,
    /// Backend answers with a full snapshot.
    SyncResponse,
    /// Unrecognized wire name.
    Unknown,
}

impl MessageType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusUpdate => "status_update",
            Self::HealthChange => "health_change",
            Self::LocationChange => "location_change",
            Self::PlayerDeath => "player_death",
            Self::PlayerRespawn => "player_respawn",
            Self::CommandExecution => "command_execution",
            Self::SyncRequest => "sync_request",
            Self::SyncResponse => "sync_response",
            Self::Unknown => "unknown",
        }
    }

    /// Resolve a wire name; never fails.
    pub fn from_name(name: &str) -> Self {
        match name {
            "status_update" => Self::StatusUpdate,
            "health_change" => Self::HealthChange,
            "location_change" => Self::LocationChange,
            "player_death" => Self::PlayerDeath,
            "player_respawn" => Self::PlayerRespawn,
            "command_execution" => Self::CommandExecution,
            "sync_request" => Self::SyncRequest,
            "sync_response" => Self::SyncResponse,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who an envelope is about and who emits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSubject {
    /// Player the envelope describes.
    pub player_uuid: Uuid,
    /// Player name at emit time.
    pub player_name: String,
    /// Emitting server.
    pub server_name: String,
}

impl MessageSubject {
    /// Build a subject.
    pub fn new(
        player_uuid: Uuid,
        player_name: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            player_uuid,
            player_name: player_name.into(),
            server_name: server_name.into(),
        }
    }
}

/// An immutable status envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatusMessage {
    message_type: MessageType,
    player_uuid: Uuid,
    player_name: String,
    server_name: String,
    timestamp: i64,
    #[serde(default)]
    data: BTreeMap<String, StatusValue>,
}

impl PlayerStatusMessage {
    /// Build an envelope stamped with the current wall-clock time.
    pub fn new(
        message_type: MessageType,
        subject: &MessageSubject,
        data: BTreeMap<String, StatusValue>,
    ) -> Self {
        Self {
            message_type,
            player_uuid: subject.player_uuid,
            player_name: subject.player_name.clone(),
            server_name: subject.server_name.clone(),
            timestamp: crate::now_millis(),
            data,
        }
    }

    /// Replace the construction timestamp. Used when replaying or testing
    /// ordering; the envelope is otherwise unchanged.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `status_update`: one key moved to `value`.
    pub fn status_update(
        subject: &MessageSubject,
        status_key: &str,
        value: StatusValue,
        reason: &str,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert("status_type".to_owned(), StatusValue::from(status_key));
        data.insert("value".to_owned(), value);
        data.insert("reason".to_owned(), StatusValue::from(reason));
        Self::new(MessageType::StatusUpdate, subject, data)
    }

    /// `health_change`.
    pub fn health_change(
        subject: &MessageSubject,
        previous_health: f64,
        new_health: f64,
        max_health: f64,
        reason: &str,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert("previous_health".to_owned(), StatusValue::Float(previous_health));
        data.insert("new_health".to_owned(), StatusValue::Float(new_health));
        data.insert("max_health".to_owned(), StatusValue::Float(max_health));
        data.insert("reason".to_owned(), StatusValue::from(reason));
        Self::new(MessageType::HealthChange, subject, data)
    }

    /// `location_change`. Only world and coordinates travel; the receiver
    /// takes the server from the envelope.
    pub fn location_change(
        subject: &MessageSubject,
        from: &PlayerLocation,
        to: &PlayerLocation,
    ) -> Self {
        let mut data = BTreeMap::new();
        from.write_prefixed("from", &mut data);
        to.write_prefixed("to", &mut data);
        Self::new(MessageType::LocationChange, subject, data)
    }

    /// `player_death`.
    pub fn player_death(subject: &MessageSubject, death_message: &str, killer: Option<&str>) -> Self {
        let mut data = BTreeMap::new();
        data.insert("death_message".to_owned(), StatusValue::from(death_message));
        if let Some(killer) = killer {
            data.insert("killer".to_owned(), StatusValue::from(killer));
        }
        Self::new(MessageType::PlayerDeath, subject, data)
    }

    /// `player_respawn`.
    pub fn player_respawn(subject: &MessageSubject, reason: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("reason".to_owned(), StatusValue::from(reason));
        Self::new(MessageType::PlayerRespawn, subject, data)
    }

    /// `command_execution`. Arguments travel space-joined.
    pub fn command_execution(
        subject: &MessageSubject,
        command: &str,
        args: &[String],
        phase: &str,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert("command".to_owned(), StatusValue::from(command));
        data.insert("args".to_owned(), StatusValue::from(args.join(" ")));
        data.insert("phase".to_owned(), StatusValue::from(phase));
        Self::new(MessageType::CommandExecution, subject, data)
    }

    /// `sync_request`: empty payload.
    pub fn sync_request(subject: &MessageSubject) -> Self {
        Self::new(MessageType::SyncRequest, subject, BTreeMap::new())
    }

    /// `sync_response`: a flat snapshot of status keys.
    pub fn sync_response(subject: &MessageSubject, snapshot: BTreeMap<String, StatusValue>) -> Self {
        Self::new(MessageType::SyncResponse, subject, snapshot)
    }

    /// Routing discriminator.
    #[inline]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Player the envelope describes.
    #[inline]
    pub fn player_uuid(&self) -> Uuid {
        self.player_uuid
    }

    /// Player name at emit time.
    #[inline]
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Emitting server.
    #[inline]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Emitter wall-clock milliseconds at construction.
    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Raw payload.
    #[inline]
    pub fn data(&self) -> &BTreeMap<String, StatusValue> {
        &self.data
    }

    /// Single payload value.
    pub fn get(&self, key: &str) -> Option<&StatusValue> {
        self.data.get(key)
    }

    /// Subject this envelope was built from.
    pub fn subject(&self) -> MessageSubject {
        MessageSubject::new(self.player_uuid, &*self.player_name, &*self.server_name)
    }

    /// Check that the payload carries every key its type requires.
    ///
    /// `sync_request`, `sync_response` and unknown types have no required keys.
    pub fn validate(&self) -> Result<()> {
        match self.message_type {
            MessageType::StatusUpdate => self.as_status_update().map(drop),
            MessageType::HealthChange => self.as_health_change().map(drop),
            MessageType::LocationChange => self.as_location_change().map(drop),
            MessageType::PlayerDeath => self.as_player_death().map(drop),
            MessageType::PlayerRespawn => self.as_player_respawn().map(drop),
            MessageType::CommandExecution => self.as_command_execution().map(drop),
            MessageType::SyncRequest | MessageType::SyncResponse | MessageType::Unknown => Ok(()),
        }
    }
}

/// Serialize an envelope to UTF-8 JSON.
pub fn encode(msg: &PlayerStatusMessage) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Parse UTF-8 JSON into an envelope.
///
/// Only the envelope shape is checked here; per-type keys are checked by
/// [`PlayerStatusMessage::validate`] or the typed readers.
pub fn decode(bytes: &[u8]) -> Result<PlayerStatusMessage> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtoError;

    fn subject() -> MessageSubject {
        MessageSubject::new(Uuid::nil(), "Steve", "survival")
    }

    #[test]
    fn envelope_round_trip() {
        let msg = PlayerStatusMessage::health_change(&subject(), 20.0, 14.0, 20.0, "damage");
        let wire = encode(&msg).unwrap();
        let back = decode(&wire).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.timestamp(), msg.timestamp());
        assert_eq!(back.get("new_health"), Some(&StatusValue::Float(14.0)));
    }

    #[test]
    fn wire_field_names() {
        let msg = PlayerStatusMessage::sync_request(&subject()).with_timestamp(42);
        let json: serde_json::Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();
        assert_eq!(json["message_type"], "sync_request");
        assert_eq!(json["player_name"], "Steve");
        assert_eq!(json["server_name"], "survival");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["player_uuid"], Uuid::nil().to_string());
        assert!(json["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn unknown_type_decodes() {
        let raw = format!(
            r#"{{"message_type":"teleport","player_uuid":"{}","player_name":"a","server_name":"b","timestamp":1,"data":{{}}}}"#,
            Uuid::nil()
        );
        let msg = decode(raw.as_bytes()).unwrap();
        assert_eq!(msg.message_type(), MessageType::Unknown);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = decode(b"{not json").unwrap_err();
        assert_eq!(err.error_code(), "malformed");
    }

    #[test]
    fn validate_reports_missing_key() {
        let mut data = BTreeMap::new();
        data.insert("previous_health".to_owned(), StatusValue::Float(20.0));
        let msg = PlayerStatusMessage::new(MessageType::HealthChange, &subject(), data);
        match msg.validate() {
            Err(ProtoError::MissingKey { message_type, key }) => {
                assert_eq!(message_type, MessageType::HealthChange);
                assert_eq!(key, "new_health");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn constructors_validate() {
        let s = subject();
        let here = PlayerLocation::new("survival", "world", 0.0, 64.0, 0.0);
        let there = PlayerLocation::new("survival", "world_nether", 8.0, 70.0, 8.0);
        let msgs = [
            PlayerStatusMessage::status_update(&s, "away", StatusValue::Bool(true), "afk"),
            PlayerStatusMessage::health_change(&s, 20.0, 5.0, 20.0, "fall"),
            PlayerStatusMessage::location_change(&s, &here, &there),
            PlayerStatusMessage::player_death(&s, "Steve fell", None),
            PlayerStatusMessage::player_respawn(&s, "death"),
            PlayerStatusMessage::command_execution(&s, "msg", &["Alex".into(), "hi".into()], "pre"),
            PlayerStatusMessage::sync_request(&s),
            PlayerStatusMessage::sync_response(&s, BTreeMap::new()),
        ];
        for msg in &msgs {
            assert!(msg.validate().is_ok(), "{}", msg.message_type());
        }
    }

    #[test]
    fn message_type_names_round_trip() {
        for name in [
            "status_update",
            "health_change",
            "location_change",
            "player_death",
            "player_respawn",
            "command_execution",
            "sync_request",
            "sync_response",
        ] {
            assert_eq!(MessageType::from_name(name).as_str(), name);
        }
    }
}
