//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use std::collections::HashSet;

use super::Config;
use crate::sync::Role;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("at least one [[channels]] entry is required")]
    NoChannels,
    #[error("channel id '{0}' is defined more than once")]
    DuplicateChannel(String),
    #[error("channel id '{0}' must be non-empty and contain no whitespace")]
    InvalidChannelName(String),
    #[error("default_channel '{0}' is not a defined channel")]
    UnknownDefaultChannel(String),
    #[error("shortcut '{0}' is used by more than one channel")]
    DuplicateShortcut(String),
    #[error("chat restriction names unknown channel '{0}'")]
    RestrictUnknownChannel(String),
    #[error("sync.listen is required when server.role = \"proxy\"")]
    MissingListen,
    #[error("sync.proxy_addr is required when server.role = \"backend\"")]
    MissingProxyAddr,
    #[error("sync.queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("sync.channel must be non-empty and contain no whitespace")]
    InvalidSyncChannel,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Required fields
    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    // Channels
    if config.channels.is_empty() {
        errors.push(ValidationError::NoChannels);
    }
    let mut ids = HashSet::new();
    let mut shortcuts = HashSet::new();
    for block in &config.channels {
        if !is_token(&block.id) {
            errors.push(ValidationError::InvalidChannelName(block.id.clone()));
        }
        if !ids.insert(block.id.as_str()) {
            errors.push(ValidationError::DuplicateChannel(block.id.clone()));
        }
        for shortcut in &block.shortcuts {
            let label = shortcut.trim_start_matches('/').to_ascii_lowercase();
            if !shortcuts.insert(label) {
                errors.push(ValidationError::DuplicateShortcut(shortcut.clone()));
            }
        }
    }
    if !config.channels.is_empty() && !ids.contains(config.default_channel.as_str()) {
        errors.push(ValidationError::UnknownDefaultChannel(
            config.default_channel.clone(),
        ));
    }
    for restricted in config
        .chat
        .restrict_in_combat
        .iter()
        .chain(&config.chat.restrict_on_critical_health)
    {
        if restricted != "*" && !ids.contains(restricted.as_str()) {
            errors.push(ValidationError::RestrictUnknownChannel(restricted.clone()));
        }
    }

    // Sync
    match config.server.role {
        Role::Proxy if config.sync.listen.is_none() => {
            errors.push(ValidationError::MissingListen);
        }
        Role::Backend if config.sync.proxy_addr.as_deref().is_none_or(str::is_empty) => {
            errors.push(ValidationError::MissingProxyAddr);
        }
        _ => {}
    }
    if config.sync.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }
    if !is_token(&config.sync.channel) {
        errors.push(ValidationError::InvalidSyncChannel);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}
