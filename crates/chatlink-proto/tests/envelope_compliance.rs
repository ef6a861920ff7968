//! Envelopes as peers actually send them: hand-written JSON rather than
//! values produced by this crate's constructors.

use chatlink_proto::{decode, MessageType, StatusType, StatusValue};

const UUID: &str = "6f1c2a8e-3b1d-4c55-9d0a-1f2e3d4c5b6a";

fn envelope(message_type: &str, data: &str) -> String {
    format!(
        r#"{{"message_type":"{message_type}","player_uuid":"{UUID}","player_name":"Steve","server_name":"survival","timestamp":1700000000000,"data":{data}}}"#
    )
}

#[test]
fn status_update_from_peer() {
    let raw = envelope(
        "status_update",
        r#"{"status_type":{"kind":"string","value":"combat"},"value":{"kind":"bool","value":true},"reason":{"kind":"string","value":"hit"}}"#,
    );
    let msg = decode(raw.as_bytes()).unwrap();
    assert_eq!(msg.message_type(), MessageType::StatusUpdate);
    assert_eq!(msg.timestamp(), 1_700_000_000_000);
    assert_eq!(msg.player_uuid().to_string(), UUID);

    let update = msg.as_status_update().unwrap();
    assert_eq!(update.status_type(), StatusType::Combat);
    assert!(update.status_type().is_valid_value(Some(&update.value)));
}

#[test]
fn mistyped_value_decodes_but_fails_validation() {
    // Shape is fine, kind is wrong for the key: the envelope must still
    // decode so the receiver can drop only this key.
    let raw = envelope(
        "status_update",
        r#"{"status_type":{"kind":"string","value":"health"},"value":{"kind":"string","value":"full"},"reason":{"kind":"string","value":"x"}}"#,
    );
    let update = decode(raw.as_bytes()).unwrap().as_status_update().unwrap();
    assert_eq!(update.status_type(), StatusType::Health);
    assert!(!update.status_type().is_valid_value(Some(&update.value)));
}

#[test]
fn null_value_is_always_valid() {
    let raw = envelope(
        "status_update",
        r#"{"status_type":{"kind":"string","value":"gamemode"},"value":{"kind":"null"},"reason":{"kind":"string","value":"logout"}}"#,
    );
    let update = decode(raw.as_bytes()).unwrap().as_status_update().unwrap();
    assert_eq!(update.value, StatusValue::Null);
    assert!(update.status_type().is_valid_value(Some(&update.value)));
}

#[test]
fn sync_response_snapshot_with_aliases() {
    let raw = envelope(
        "sync_response",
        r#"{"game_mode":{"kind":"string","value":"SURVIVAL"},"food_level":{"kind":"int","value":18},"world":{"kind":"string","value":"world"}}"#,
    );
    let msg = decode(raw.as_bytes()).unwrap();
    assert!(msg.validate().is_ok());
    let kinds: Vec<StatusType> = msg.data().keys().map(|k| StatusType::from_key(k)).collect();
    assert!(kinds.contains(&StatusType::GameMode));
    assert!(kinds.contains(&StatusType::FoodLevel));
    assert!(kinds.contains(&StatusType::Custom));
}

#[test]
fn missing_data_defaults_to_empty() {
    let raw = format!(
        r#"{{"message_type":"sync_request","player_uuid":"{UUID}","player_name":"Steve","server_name":"proxy","timestamp":5}}"#
    );
    let msg = decode(raw.as_bytes()).unwrap();
    assert!(msg.data().is_empty());
}

#[test]
fn bad_uuid_is_malformed() {
    let raw = r#"{"message_type":"sync_request","player_uuid":"nope","player_name":"a","server_name":"b","timestamp":1,"data":{}}"#;
    assert_eq!(decode(raw.as_bytes()).unwrap_err().error_code(), "malformed");
}

#[test]
fn incomplete_death_fails_validation() {
    let raw = envelope("player_death", r#"{"killer":{"kind":"string","value":"Alex"}}"#);
    let msg = decode(raw.as_bytes()).unwrap();
    assert_eq!(msg.validate().unwrap_err().error_code(), "missing_key");
}
