//! Event catalogue.
//!
//! Cancellable events implement [`Cancellable`]; everything else is
//! informational. Fields are read through accessors; only the fields a
//! listener may legitimately rewrite have setters.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chatlink_proto::{PlayerLocation, StatusValue};

use super::{Cancellable, Event};
use crate::state::{OnlineUser, StatusKey};

/// Declares a reason enum with upper-snake wire names and a case-insensitive
/// parser that falls back to the given variant.
macro_rules! reason_enum {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Case-insensitive parse; unknown names map to the fallback.
            pub fn from_name(name: &str) -> Self {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|r| r.as_str().eq_ignore_ascii_case(name))
                    .unwrap_or(Self::$fallback)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

reason_enum! {
    /// Why a channel switch was requested.
    SwitchReason, fallback = Other {
        PlayerCommand => "PLAYER_COMMAND",
        ServerSwitch => "SERVER_SWITCH",
        PlayerJoin => "PLAYER_JOIN",
        AdminForce => "ADMIN_FORCE",
        ApiCall => "API_CALL",
        Other => "OTHER",
    }
}

reason_enum! {
    /// Why a player joined a channel.
    JoinReason, fallback = ApiCall {
        FirstLogin => "FIRST_LOGIN",
        Reconnect => "RECONNECT",
        ServerSwitch => "SERVER_SWITCH",
        ManualSwitch => "MANUAL_SWITCH",
        AdminAction => "ADMIN_ACTION",
        ApiCall => "API_CALL",
    }
}

impl From<SwitchReason> for JoinReason {
    fn from(reason: SwitchReason) -> Self {
        match reason {
            SwitchReason::PlayerCommand => Self::ManualSwitch,
            SwitchReason::ServerSwitch => Self::ServerSwitch,
            SwitchReason::PlayerJoin => Self::FirstLogin,
            SwitchReason::AdminForce => Self::AdminAction,
            SwitchReason::ApiCall | SwitchReason::Other => Self::ApiCall,
        }
    }
}

reason_enum! {
    /// Why a player left a channel.
    LeaveReason, fallback = ApiCall {
        Disconnect => "DISCONNECT",
        ChannelSwitch => "CHANNEL_SWITCH",
        ServerSwitch => "SERVER_SWITCH",
        AdminAction => "ADMIN_ACTION",
        ApiCall => "API_CALL",
        PermissionRevoked => "PERMISSION_REVOKED",
    }
}

reason_enum! {
    /// Which filter stage produced a [`MessageFilter`] event.
    FilterType, fallback = Custom {
        Profanity => "PROFANITY",
        Spam => "SPAM",
        Advertisement => "ADVERTISEMENT",
        Custom => "CUSTOM",
        Replacer => "REPLACER",
        Format => "FORMAT",
    }
}

reason_enum! {
    /// Before or after a command handler runs.
    ExecutionPhase, fallback = Pre {
        Pre => "PRE",
        Post => "POST",
    }
}

reason_enum! {
    /// What changed a player's health.
    HealthChangeReason, fallback = Other {
        EntityAttack => "ENTITY_ATTACK",
        PlayerAttack => "PLAYER_ATTACK",
        Environmental => "ENVIRONMENTAL",
        Starvation => "STARVATION",
        Poison => "POISON",
        Magic => "MAGIC",
        Healing => "HEALING",
        Regeneration => "REGENERATION",
        Food => "FOOD",
        Potion => "POTION",
        Plugin => "PLUGIN",
        Other => "OTHER",
    }
}

reason_enum! {
    /// What moved a player.
    MovementReason, fallback = Other {
        PlayerMovement => "PLAYER_MOVEMENT",
        Teleport => "TELEPORT",
        ServerSwitch => "SERVER_SWITCH",
        WorldChange => "WORLD_CHANGE",
        Respawn => "RESPAWN",
        Plugin => "PLUGIN",
        Other => "OTHER",
    }
}

reason_enum! {
    /// How a player died.
    DeathCause, fallback = Other {
        PlayerKill => "PLAYER_KILL",
        EntityKill => "ENTITY_KILL",
        FallDamage => "FALL_DAMAGE",
        FireDamage => "FIRE_DAMAGE",
        LavaDamage => "LAVA_DAMAGE",
        Drowning => "DROWNING",
        Suffocation => "SUFFOCATION",
        Starvation => "STARVATION",
        Poison => "POISON",
        MagicDamage => "MAGIC_DAMAGE",
        Explosion => "EXPLOSION",
        VoidDamage => "VOID_DAMAGE",
        Lightning => "LIGHTNING",
        Suicide => "SUICIDE",
        Plugin => "PLUGIN",
        Other => "OTHER",
    }
}

reason_enum! {
    /// Where a player respawned.
    RespawnReason, fallback = Other {
        Normal => "NORMAL",
        Bed => "BED",
        RespawnAnchor => "RESPAWN_ANCHOR",
        Plugin => "PLUGIN",
        Other => "OTHER",
    }
}

/// Built-in chat command families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    ChannelSwitch,
    PrivateMessage,
    Reply,
    Broadcast,
    SocialSpy,
    LocalSpy,
    OptOutMessage,
    ChannelShortcut,
    Other,
}

impl CommandType {
    pub const ALL: &'static [CommandType] = &[
        Self::ChannelSwitch,
        Self::PrivateMessage,
        Self::Reply,
        Self::Broadcast,
        Self::SocialSpy,
        Self::LocalSpy,
        Self::OptOutMessage,
        Self::ChannelShortcut,
        Self::Other,
    ];

    /// Slash-prefixed labels that select this type.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::ChannelSwitch => &["/channel", "/c"],
            Self::PrivateMessage => &["/msg", "/tell", "/whisper", "/w", "/m", "/pm"],
            Self::Reply => &["/reply", "/r"],
            Self::Broadcast => &["/broadcast", "/alert"],
            Self::SocialSpy => &["/socialspy", "/ss"],
            Self::LocalSpy => &["/localspy", "/ls"],
            Self::OptOutMessage => &["/optoutmsg"],
            Self::ChannelShortcut => &["shortcut"],
            Self::Other => &["other"],
        }
    }

    /// Classify a command label, with or without its leading slash.
    pub fn from_command(command: &str) -> Self {
        let lower = command.to_ascii_lowercase();
        let normalized = if lower.starts_with('/') {
            lower
        } else {
            format!("/{lower}")
        };
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.aliases().contains(&normalized.as_str()))
            .unwrap_or(Self::Other)
    }
}

// ============================================================================
// Chat events
// ============================================================================

/// A player sends a message to a channel.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    sender: Arc<OnlineUser>,
    channel: String,
    message: String,
}

impl ChatMessage {
    pub fn new(sender: Arc<OnlineUser>, channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender,
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn sender(&self) -> &Arc<OnlineUser> {
        &self.sender
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn set_channel(&mut self, channel: impl Into<String>) {
        self.channel = channel.into();
    }
}

impl Event for ChatMessage {
    const NAME: &'static str = "chat_message";
}
impl Cancellable for ChatMessage {}

/// A direct message to one or more players.
#[derive(Debug, Clone)]
pub struct PrivateMessage {
    sender: Arc<OnlineUser>,
    recipients: Vec<Arc<OnlineUser>>,
    message: String,
}

impl PrivateMessage {
    pub fn new(sender: Arc<OnlineUser>, recipients: Vec<Arc<OnlineUser>>, message: impl Into<String>) -> Self {
        Self {
            sender,
            recipients,
            message: message.into(),
        }
    }

    pub fn sender(&self) -> &Arc<OnlineUser> {
        &self.sender
    }

    pub fn recipients(&self) -> &[Arc<OnlineUser>] {
        &self.recipients
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn set_recipients(&mut self, recipients: Vec<Arc<OnlineUser>>) {
        self.recipients = recipients;
    }
}

impl Event for PrivateMessage {
    const NAME: &'static str = "private_message";
}
impl Cancellable for PrivateMessage {}

/// A message to every online player.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    sender: Arc<OnlineUser>,
    message: String,
}

impl BroadcastMessage {
    pub fn new(sender: Arc<OnlineUser>, message: impl Into<String>) -> Self {
        Self {
            sender,
            message: message.into(),
        }
    }

    pub fn sender(&self) -> &Arc<OnlineUser> {
        &self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }
}

impl Event for BroadcastMessage {
    const NAME: &'static str = "broadcast_message";
}
impl Cancellable for BroadcastMessage {}

/// A message passed through a filter stage.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    sender: Arc<OnlineUser>,
    channel: Option<String>,
    original: String,
    filtered: String,
    filter_type: FilterType,
    filter_name: String,
    reason: Option<String>,
    blocked: bool,
}

impl MessageFilter {
    pub fn new(
        sender: Arc<OnlineUser>,
        channel: Option<String>,
        original: impl Into<String>,
        filtered: impl Into<String>,
        filter_type: FilterType,
        filter_name: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            channel,
            original: original.into(),
            filtered: filtered.into(),
            filter_type,
            filter_name: filter_name.into(),
            reason: None,
            blocked: false,
        }
    }

    pub fn sender(&self) -> &Arc<OnlineUser> {
        &self.sender
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn filtered(&self) -> &str {
        &self.filtered
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_filtered(&mut self, text: impl Into<String>) {
        self.filtered = text.into();
    }

    pub fn set_reason(&mut self, reason: Option<String>) {
        self.reason = reason;
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }
}

impl Event for MessageFilter {
    const NAME: &'static str = "message_filter";
}
impl Cancellable for MessageFilter {}

/// A chat command about to run (`Pre`) or just finished (`Post`).
#[derive(Debug, Clone)]
pub struct ChatCommand {
    sender: Arc<OnlineUser>,
    command: String,
    command_type: CommandType,
    args: Vec<String>,
    phase: ExecutionPhase,
    success: bool,
    failure_reason: Option<String>,
}

impl ChatCommand {
    pub fn new(
        sender: Arc<OnlineUser>,
        command: impl Into<String>,
        args: Vec<String>,
        phase: ExecutionPhase,
    ) -> Self {
        let command = command.into();
        Self {
            sender,
            command_type: CommandType::from_command(&command),
            command,
            args,
            phase,
            success: true,
            failure_reason: None,
        }
    }

    pub fn sender(&self) -> &Arc<OnlineUser> {
        &self.sender
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub fn set_successful(&mut self, success: bool) {
        self.success = success;
    }

    pub fn set_failure_reason(&mut self, reason: Option<String>) {
        self.failure_reason = reason;
    }
}

impl Event for ChatCommand {
    const NAME: &'static str = "chat_command";
}
impl Cancellable for ChatCommand {}

// ============================================================================
// Channel events
// ============================================================================

/// A player is about to move to another channel.
#[derive(Debug, Clone)]
pub struct ChannelSwitch {
    player: Arc<OnlineUser>,
    previous: Option<String>,
    new_channel: String,
    reason: SwitchReason,
}

impl ChannelSwitch {
    pub fn new(
        player: Arc<OnlineUser>,
        previous: Option<String>,
        new_channel: impl Into<String>,
        reason: SwitchReason,
    ) -> Self {
        Self {
            player,
            previous,
            new_channel: new_channel.into(),
            reason,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn new_channel(&self) -> &str {
        &self.new_channel
    }

    pub fn reason(&self) -> SwitchReason {
        self.reason
    }

    /// Redirect the switch to another channel id.
    pub fn set_new_channel(&mut self, channel: impl Into<String>) {
        self.new_channel = channel.into();
    }
}

impl Event for ChannelSwitch {
    const NAME: &'static str = "channel_switch";
}
impl Cancellable for ChannelSwitch {}

/// A player became a member of a channel.
#[derive(Debug, Clone)]
pub struct PlayerJoinChannel {
    player: Arc<OnlineUser>,
    channel: String,
    reason: JoinReason,
}

impl PlayerJoinChannel {
    pub fn new(player: Arc<OnlineUser>, channel: impl Into<String>, reason: JoinReason) -> Self {
        Self {
            player,
            channel: channel.into(),
            reason,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn reason(&self) -> JoinReason {
        self.reason
    }
}

impl Event for PlayerJoinChannel {
    const NAME: &'static str = "player_join_channel";
}

/// A player stopped being a member of a channel.
#[derive(Debug, Clone)]
pub struct PlayerLeaveChannel {
    player: Arc<OnlineUser>,
    channel: String,
    reason: LeaveReason,
}

impl PlayerLeaveChannel {
    pub fn new(player: Arc<OnlineUser>, channel: impl Into<String>, reason: LeaveReason) -> Self {
        Self {
            player,
            channel: channel.into(),
            reason,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn reason(&self) -> LeaveReason {
        self.reason
    }
}

impl Event for PlayerLeaveChannel {
    const NAME: &'static str = "player_leave_channel";
}

// ============================================================================
// Gameplay events
// ============================================================================

#[derive(Debug, Clone)]
pub struct PlayerHealthChange {
    player: Arc<OnlineUser>,
    previous: f64,
    new: f64,
    max: f64,
    reason: HealthChangeReason,
    damager: Option<String>,
}

impl PlayerHealthChange {
    pub fn new(
        player: Arc<OnlineUser>,
        previous: f64,
        new: f64,
        max: f64,
        reason: HealthChangeReason,
        damager: Option<String>,
    ) -> Self {
        Self {
            player,
            previous,
            new,
            max,
            reason,
            damager,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn previous_health(&self) -> f64 {
        self.previous
    }

    pub fn new_health(&self) -> f64 {
        self.new
    }

    pub fn max_health(&self) -> f64 {
        self.max
    }

    pub fn reason(&self) -> HealthChangeReason {
        self.reason
    }

    pub fn damager(&self) -> Option<&str> {
        self.damager.as_deref()
    }

    pub fn is_about_to_die(&self) -> bool {
        self.new <= 0.0
    }

    pub fn is_low_health(&self) -> bool {
        self.new <= self.max * 0.2
    }

    pub fn is_critical_health(&self) -> bool {
        self.new <= self.max * 0.1
    }
}

impl Event for PlayerHealthChange {
    const NAME: &'static str = "player_health_change";
}

#[derive(Debug, Clone)]
pub struct PlayerLocationChange {
    player: Arc<OnlineUser>,
    previous: Option<PlayerLocation>,
    new: PlayerLocation,
    reason: MovementReason,
}

impl PlayerLocationChange {
    pub fn new(
        player: Arc<OnlineUser>,
        previous: Option<PlayerLocation>,
        new: PlayerLocation,
        reason: MovementReason,
    ) -> Self {
        Self {
            player,
            previous,
            new,
            reason,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn previous_location(&self) -> Option<&PlayerLocation> {
        self.previous.as_ref()
    }

    pub fn new_location(&self) -> &PlayerLocation {
        &self.new
    }

    pub fn reason(&self) -> MovementReason {
        self.reason
    }

    pub fn is_cross_world(&self) -> bool {
        self.previous.as_ref().is_some_and(|p| p.world != self.new.world)
    }

    pub fn is_cross_server(&self) -> bool {
        self.previous.as_ref().is_some_and(|p| p.server != self.new.server)
    }

    /// Distance moved, `-1.0` with no previous location or across worlds.
    pub fn distance(&self) -> f64 {
        match &self.previous {
            Some(prev) if !self.is_cross_world() => prev.distance(&self.new),
            _ => -1.0,
        }
    }
}

impl Event for PlayerLocationChange {
    const NAME: &'static str = "player_location_change";
}

/// A status attribute is changing.
///
/// Fired before local writes, where cancelling prevents the write, and
/// after replicated writes, where it is informational.
#[derive(Debug, Clone)]
pub struct PlayerStatusChange {
    player: Arc<OnlineUser>,
    key: StatusKey,
    previous: Option<StatusValue>,
    new: StatusValue,
    reason: String,
    duration: Option<Duration>,
}

impl PlayerStatusChange {
    pub fn new(
        player: Arc<OnlineUser>,
        key: StatusKey,
        previous: Option<StatusValue>,
        new: StatusValue,
        reason: impl Into<String>,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            player,
            key,
            previous,
            new,
            reason: reason.into(),
            duration,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn key(&self) -> &StatusKey {
        &self.key
    }

    pub fn previous_value(&self) -> Option<&StatusValue> {
        self.previous.as_ref()
    }

    pub fn new_value(&self) -> &StatusValue {
        &self.new
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Whether the new value expires on its own.
    pub fn is_temporary(&self) -> bool {
        self.duration.is_some_and(|d| !d.is_zero())
    }
}

impl Event for PlayerStatusChange {
    const NAME: &'static str = "player_status_change";
}
impl Cancellable for PlayerStatusChange {}

#[derive(Debug, Clone)]
pub struct PlayerDeath {
    player: Arc<OnlineUser>,
    death_message: String,
    cause: DeathCause,
    killer: Option<Arc<OnlineUser>>,
    death_location: Option<PlayerLocation>,
    send_message: bool,
    target_channel: Option<String>,
}

impl PlayerDeath {
    pub fn new(
        player: Arc<OnlineUser>,
        death_message: impl Into<String>,
        cause: DeathCause,
        killer: Option<Arc<OnlineUser>>,
        death_location: Option<PlayerLocation>,
    ) -> Self {
        Self {
            player,
            death_message: death_message.into(),
            cause,
            killer,
            death_location,
            send_message: true,
            target_channel: None,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn death_message(&self) -> &str {
        &self.death_message
    }

    pub fn cause(&self) -> DeathCause {
        self.cause
    }

    pub fn killer(&self) -> Option<&Arc<OnlineUser>> {
        self.killer.as_ref()
    }

    pub fn death_location(&self) -> Option<&PlayerLocation> {
        self.death_location.as_ref()
    }

    pub fn should_send_message(&self) -> bool {
        self.send_message
    }

    pub fn target_channel(&self) -> Option<&str> {
        self.target_channel.as_deref()
    }

    pub fn set_death_message(&mut self, message: impl Into<String>) {
        self.death_message = message.into();
    }

    pub fn set_send_message(&mut self, send: bool) {
        self.send_message = send;
    }

    pub fn set_target_channel(&mut self, channel: Option<String>) {
        self.target_channel = channel;
    }
}

impl Event for PlayerDeath {
    const NAME: &'static str = "player_death";
}

#[derive(Debug, Clone)]
pub struct PlayerRespawn {
    player: Arc<OnlineUser>,
    respawn_location: Option<PlayerLocation>,
    reason: RespawnReason,
    send_message: bool,
    target_channel: Option<String>,
    message: Option<String>,
}

impl PlayerRespawn {
    pub fn new(player: Arc<OnlineUser>, respawn_location: Option<PlayerLocation>, reason: RespawnReason) -> Self {
        Self {
            player,
            respawn_location,
            reason,
            send_message: false,
            target_channel: None,
            message: None,
        }
    }

    pub fn player(&self) -> &Arc<OnlineUser> {
        &self.player
    }

    pub fn respawn_location(&self) -> Option<&PlayerLocation> {
        self.respawn_location.as_ref()
    }

    pub fn reason(&self) -> RespawnReason {
        self.reason
    }

    pub fn should_send_message(&self) -> bool {
        self.send_message
    }

    pub fn target_channel(&self) -> Option<&str> {
        self.target_channel.as_deref()
    }

    /// Announcement text; listeners that enable sending set this.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_respawn_location(&mut self, location: PlayerLocation) {
        self.respawn_location = Some(location);
    }

    pub fn set_send_message(&mut self, send: bool) {
        self.send_message = send;
    }

    pub fn set_target_channel(&mut self, channel: Option<String>) {
        self.target_channel = channel;
    }

    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }
}

impl Event for PlayerRespawn {
    const NAME: &'static str = "player_respawn";
}
