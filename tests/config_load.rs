//! Loading daemon configuration from disk.

use std::io::Write;
use std::time::Duration;

use chatlink::config::{self, Config, ConfigError, ValidationError};
use chatlink::sync::Role;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_backend_config() {
    let file = write_config(
        r#"
default_channel = "local"

[server]
name = "survival"
role = "backend"

[sync]
proxy_addr = "127.0.0.1:25580"
queue_capacity = 16
resync_interval_secs = 30

[[channels]]
id = "local"
display_name = "Local"
shortcuts = ["/l"]

[[channels]]
id = "global"

[chat]
format = "<{player}> {message}"
restrict_in_combat = ["global"]
blocked_words = ["heck"]
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert!(config::validate(&config).is_ok());
    assert_eq!(config.server.role, Role::Backend);
    assert_eq!(config.sync.proxy_addr.as_deref(), Some("127.0.0.1:25580"));
    assert_eq!(config.sync.queue_capacity, 16);
    assert_eq!(config.sync.resync_interval(), Some(Duration::from_secs(30)));
    assert_eq!(config.sync.channel, "chatlink:player_status");

    let local = config.channels[0].to_channel();
    assert_eq!(local.display_name, "Local");
    assert_eq!(local.shortcuts, vec!["l".to_owned()]);
    assert_eq!(config.chat.format, "<{player}> {message}");
    assert!(config.chat.restricts_in_combat("global"));
    assert!(!config.chat.restricts_in_combat("local"));
}

#[test]
fn rejects_duplicate_channel_ids() {
    let file = write_config(
        r#"
[server]
name = "proxy"
role = "proxy"

[sync]
listen = "127.0.0.1:25580"

[[channels]]
id = "global"

[[channels]]
id = "global"
display_name = "Also Global"
"#,
    );

    let config = Config::load(file.path()).unwrap();
    let errors = config::validate(&config).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], ValidationError::DuplicateChannel(id) if id == "global"));
}

#[test]
fn missing_file_and_bad_role() {
    let err = Config::load("/nonexistent/chatlink.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));

    let file = write_config("[server]\nname = \"x\"\nrole = \"hub\"\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
