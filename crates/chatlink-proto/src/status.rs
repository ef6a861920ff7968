//! Typed player status attributes.
//!
//! Each [`StatusType`] declares the [`ValueKind`] it accepts. Unknown keys
//! never fail to parse: they fall into the [`StatusType::Custom`] bucket,
//! which accepts any kind.

use std::fmt;

use crate::value::{StatusValue, ValueKind};

/// A named, typed, ephemeral player attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusType {
    /// Player marked away.
    Away,
    /// Player in combat.
    Combat,
    /// Player sneaking.
    Sneaking,
    /// Player flying.
    Flying,
    /// Game mode name (`SURVIVAL`, `CREATIVE`, ...).
    GameMode,
    /// Food level, 0..=20.
    FoodLevel,
    /// Experience level.
    ExperienceLevel,
    /// Player muted in chat.
    Muted,
    /// Player busy (do not disturb).
    Busy,
    /// Player hidden from others.
    Vanished,
    /// Current health.
    Health,
    /// Maximum health.
    MaxHealth,
    /// Any attribute this protocol does not name.
    Custom,
}

impl StatusType {
    /// Every status type, in declaration order.
    pub const ALL: [StatusType; 13] = [
        Self::Away,
        Self::Combat,
        Self::Sneaking,
        Self::Flying,
        Self::GameMode,
        Self::FoodLevel,
        Self::ExperienceLevel,
        Self::Muted,
        Self::Busy,
        Self::Vanished,
        Self::Health,
        Self::MaxHealth,
        Self::Custom,
    ];

    /// Canonical wire key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Away => "away",
            Self::Combat => "combat",
            Self::Sneaking => "sneaking",
            Self::Flying => "flying",
            Self::GameMode => "gamemode",
            Self::FoodLevel => "food",
            Self::ExperienceLevel => "exp_level",
            Self::Muted => "muted",
            Self::Busy => "busy",
            Self::Vanished => "vanished",
            Self::Health => "health",
            Self::MaxHealth => "max_health",
            Self::Custom => "custom",
        }
    }

    /// Kind of value this attribute accepts.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Away
            | Self::Combat
            | Self::Sneaking
            | Self::Flying
            | Self::Muted
            | Self::Busy
            | Self::Vanished => ValueKind::Bool,
            Self::GameMode => ValueKind::Str,
            Self::FoodLevel | Self::ExperienceLevel => ValueKind::Int,
            Self::Health | Self::MaxHealth => ValueKind::Float,
            Self::Custom => ValueKind::Any,
        }
    }

    /// Resolve a wire key. Backend snapshots use a few long-form aliases
    /// (`game_mode`, `food_level`, `experience_level`); anything else that
    /// is not a known key maps to [`StatusType::Custom`].
    pub fn from_key(key: &str) -> Self {
        match key {
            "away" => Self::Away,
            "combat" => Self::Combat,
            "sneaking" => Self::Sneaking,
            "flying" => Self::Flying,
            "gamemode" | "game_mode" => Self::GameMode,
            "food" | "food_level" => Self::FoodLevel,
            "exp_level" | "experience_level" => Self::ExperienceLevel,
            "muted" => Self::Muted,
            "busy" => Self::Busy,
            "vanished" => Self::Vanished,
            "health" => Self::Health,
            "max_health" => Self::MaxHealth,
            _ => Self::Custom,
        }
    }

    /// Whether `value` may be written to this attribute.
    ///
    /// `None` and [`StatusValue::Null`] are always legal ("no opinion").
    pub fn is_valid_value(&self, value: Option<&StatusValue>) -> bool {
        match value {
            None | Some(StatusValue::Null) => true,
            Some(v) => {
                let declared = self.value_kind();
                declared == ValueKind::Any || declared == v.kind()
            }
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
