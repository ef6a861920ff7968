//! The chat context: one handle over sessions, channels, events and sync.
//!
//! Everything a platform adapter or command handler needs goes through a
//! [`ChatContext`]. Each chat action runs as a single game-thread task so
//! listeners see a consistent view and nothing interleaves with a switch.

use std::sync::Arc;
use std::time::Duration;

use chatlink_proto::{PlayerLocation, PlayerStatusMessage, StatusValue, now_millis};
use tracing::{debug, info, warn};

use crate::channels::{ChannelRegistry, SwitchCoordinator, SwitchOutcome};
use crate::collab::{
    BridgedMessage, ChatBridge, ChatFilter, DefaultPermissions, Formatter, LogSink, MessageSink,
    NoBridge, PermissionProvider, PlaceholderFormatter,
};
use crate::config::ChatConfig;
use crate::error::{ChatError, StatusError};
use crate::events::{
    BroadcastMessage, ChatCommand, ChatMessage, CommandType, DeathCause, EventProvider,
    ExecutionPhase, HealthChangeReason, MessageFilter, MovementReason, PlayerDeath,
    PlayerHealthChange, PlayerLocationChange, PlayerRespawn, PlayerStatusChange, PrivateMessage,
    RespawnReason, SwitchReason,
};
use crate::game::GameFuture;
use crate::state::{OnlineUser, SessionRegistry, StatusKey, WriteOutcome};
use crate::sync::{SyncManager, SyncRouter};

/// Result of [`ChatContext::update_player_status`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatusOutcome {
    /// Written locally and published.
    Applied { previous: Option<StatusValue> },
    /// A listener vetoed the change.
    Cancelled,
    /// A newer write got there first.
    Stale,
    Rejected(StatusError),
}

impl StatusOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Result of [`ChatContext::execute_chat_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Executed { success: bool },
    /// The PRE listener cancelled the command.
    Cancelled,
    /// The sender lacks the command's permission.
    Denied,
}

/// Handle to the chat core of one process.
#[derive(Clone)]
pub struct ChatContext {
    sessions: Arc<SessionRegistry>,
    events: EventProvider,
    channels: Arc<ChannelRegistry>,
    switches: SwitchCoordinator,
    sync: SyncManager,
    permissions: Arc<dyn PermissionProvider>,
    formatter: Arc<dyn Formatter>,
    sink: Arc<dyn MessageSink>,
    bridge: Arc<dyn ChatBridge>,
    filters: Arc<Vec<Arc<dyn ChatFilter>>>,
    chat: Arc<ChatConfig>,
}

impl ChatContext {
    /// Context with the default collaborators: permissions answer their
    /// default, delivery goes to the log, nothing is bridged or filtered.
    pub fn new(
        sessions: Arc<SessionRegistry>,
        events: EventProvider,
        channels: Arc<ChannelRegistry>,
        sync: SyncManager,
        chat: ChatConfig,
    ) -> Self {
        let switches = SwitchCoordinator::new(events.clone(), channels.clone());
        Self {
            sessions,
            events,
            channels,
            switches,
            sync,
            permissions: Arc::new(DefaultPermissions),
            formatter: Arc::new(PlaceholderFormatter),
            sink: Arc::new(LogSink),
            bridge: Arc::new(NoBridge),
            filters: Arc::new(Vec::new()),
            chat: Arc::new(chat),
        }
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_bridge(mut self, bridge: Arc<dyn ChatBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    /// Append a stage to the filter chain. Stages run in insertion order.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn ChatFilter>) -> Self {
        Arc::make_mut(&mut self.filters).push(filter);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn events(&self) -> &EventProvider {
        &self.events
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub fn sync(&self) -> &SyncManager {
        &self.sync
    }

    /// Inbound router sharing this context's state and delivery sink.
    pub fn router(&self) -> SyncRouter {
        SyncRouter::new(
            self.sync.clone(),
            self.sessions.clone(),
            self.events.clone(),
            self.channels.clone(),
            self.sink.clone(),
        )
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    pub fn switch_player_channel(
        &self,
        player: Arc<OnlineUser>,
        channel: &str,
        reason: SwitchReason,
    ) -> GameFuture<SwitchOutcome> {
        self.switches.switch(player, channel, reason)
    }

    /// Online players whose membership points at `channel`.
    pub fn players_in_channel(&self, channel: &str) -> Vec<Arc<OnlineUser>> {
        self.channels
            .players_in_channel(channel)
            .into_iter()
            .filter_map(|uuid| self.sessions.get(uuid))
            .collect()
    }

    pub fn is_player_in_channel(&self, player: &OnlineUser, channel: &str) -> bool {
        self.channels.is_player_in_channel(player.uuid(), channel)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Change one status of a local player.
    ///
    /// Fires a cancellable `PlayerStatusChange` first; if it goes through
    /// the value is written (expiring after `duration` when given) and
    /// published to the other end of the topology.
    pub fn update_player_status(
        &self,
        player: Arc<OnlineUser>,
        key: impl Into<StatusKey>,
        value: StatusValue,
        reason: &str,
        duration: Option<Duration>,
    ) -> GameFuture<StatusOutcome> {
        let this = self.clone();
        let key = key.into();
        let reason = reason.to_owned();
        self.events
            .game()
            .call(move || this.update_status_here(player, key, value, &reason, duration))
    }

    fn update_status_here(
        &self,
        player: Arc<OnlineUser>,
        key: StatusKey,
        value: StatusValue,
        reason: &str,
        duration: Option<Duration>,
    ) -> StatusOutcome {
        if let Err(e) = key.check(&value) {
            debug!(player = %player.username(), key = %key, error = %e, "Status update rejected");
            return StatusOutcome::Rejected(e);
        }

        let previous = player.status().get(&key);
        let proposal = PlayerStatusChange::new(
            player.clone(),
            key.clone(),
            previous,
            value.clone(),
            reason,
            duration,
        );
        if self.events.dispatch_here(proposal).cancelled {
            debug!(player = %player.username(), key = %key, "Status update cancelled");
            return StatusOutcome::Cancelled;
        }

        let timestamp = now_millis();
        match player
            .status()
            .write(key.clone(), value.clone(), timestamp, duration)
        {
            Ok(WriteOutcome::Applied { previous }) => {
                let msg = PlayerStatusMessage::status_update(
                    &self.sync.subject_for(&player),
                    key.wire_key(),
                    value,
                    reason,
                )
                .with_timestamp(timestamp);
                self.sync.publish(&msg);
                StatusOutcome::Applied { previous }
            }
            Ok(WriteOutcome::Stale { .. }) => StatusOutcome::Stale,
            Err(e) => StatusOutcome::Rejected(e),
        }
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Whether `player` may speak in `channel` right now.
    pub fn check_chat_conditions(&self, player: &OnlineUser, channel: &str) -> Result<(), ChatError> {
        let node = format!("chatlink.channel.{channel}.send");
        if !self.permissions.has_permission(player.uuid(), &node, true) {
            return Err(ChatError::NoPermission(node));
        }
        if player.is_muted() {
            return Err(ChatError::Muted);
        }
        if self
            .permissions
            .has_permission(player.uuid(), &self.chat.bypass_permission, false)
        {
            return Ok(());
        }
        if player.is_critical_health() && self.chat.restricts_on_critical_health(channel) {
            return Err(ChatError::CriticalHealth(channel.to_owned()));
        }
        if player.is_in_combat() && self.chat.restricts_in_combat(channel) {
            return Err(ChatError::InCombat(channel.to_owned()));
        }
        Ok(())
    }

    /// Send `message` from `sender` to `channel`. Resolves to how many
    /// players it was delivered to.
    pub fn send_channel_message(
        &self,
        sender: Arc<OnlineUser>,
        channel: &str,
        message: &str,
    ) -> GameFuture<Result<usize, ChatError>> {
        let this = self.clone();
        let channel = channel.to_owned();
        let message = message.to_owned();
        self.events
            .game()
            .call(move || this.channel_message_here(sender, &channel, &message))
    }

    fn channel_message_here(
        &self,
        sender: Arc<OnlineUser>,
        channel: &str,
        message: &str,
    ) -> Result<usize, ChatError> {
        if !self.channels.contains(channel) {
            return Err(ChatError::UnknownChannel(channel.to_owned()));
        }
        self.check_chat_conditions(&sender, channel)?;
        let text = self.run_filters(&sender, Some(channel), message)?;

        let dispatched = self
            .events
            .dispatch_here(ChatMessage::new(sender.clone(), channel, text));
        if dispatched.cancelled {
            debug!(player = %sender.username(), channel, "Chat message cancelled");
            return Err(ChatError::Cancelled);
        }
        let event = dispatched.into_event();
        let channel = event.channel();
        if !self.channels.contains(channel) {
            warn!(player = %sender.username(), channel, "Chat message rewritten to unknown channel");
            return Err(ChatError::UnknownChannel(channel.to_owned()));
        }

        let rendered = self
            .formatter
            .format(&self.chat.format, &sender)
            .replace("{channel}", channel)
            .replace("{message}", event.message());
        let delivered =
            self.channels
                .deliver_to_members(channel, &self.sessions, self.sink.as_ref(), &rendered);

        if !is_bridged(&sender) {
            self.bridge.relay(&BridgedMessage {
                platform: self.sync.local_name.clone(),
                author: sender.username().to_owned(),
                channel: channel.to_owned(),
                content: event.message().to_owned(),
            });
        }
        debug!(player = %sender.username(), channel, delivered, "Chat message sent");
        Ok(delivered)
    }

    /// Deliver `text` to every member of `channel` without a sender, events
    /// or formatting.
    pub fn send_system_message(&self, channel: &str, text: &str) -> Result<usize, ChatError> {
        if !self.channels.contains(channel) {
            return Err(ChatError::UnknownChannel(channel.to_owned()));
        }
        Ok(self
            .channels
            .deliver_to_members(channel, &self.sessions, self.sink.as_ref(), text))
    }

    /// Send a private message to the named players. Names nobody knows are
    /// skipped; the send fails only when none of them is online.
    pub fn send_private_message(
        &self,
        sender: Arc<OnlineUser>,
        recipients: &[String],
        message: &str,
    ) -> GameFuture<Result<usize, ChatError>> {
        let this = self.clone();
        let recipients = recipients.to_vec();
        let message = message.to_owned();
        self.events
            .game()
            .call(move || this.private_message_here(sender, &recipients, &message))
    }

    fn private_message_here(
        &self,
        sender: Arc<OnlineUser>,
        names: &[String],
        message: &str,
    ) -> Result<usize, ChatError> {
        if sender.is_muted() {
            return Err(ChatError::Muted);
        }
        let recipients: Vec<Arc<OnlineUser>> = names
            .iter()
            .filter_map(|name| self.sessions.find_by_name(name))
            .collect();
        if recipients.is_empty() {
            return Err(ChatError::NoRecipients);
        }
        let text = self.run_filters(&sender, None, message)?;

        let dispatched = self
            .events
            .dispatch_here(PrivateMessage::new(sender.clone(), recipients, text));
        if dispatched.cancelled {
            return Err(ChatError::Cancelled);
        }
        let event = dispatched.into_event();
        let template = self.formatter.format(&self.chat.private_format, &sender);
        for recipient in event.recipients() {
            let rendered = template
                .replace("{recipient}", recipient.username())
                .replace("{message}", event.message());
            self.sink.deliver(recipient, &rendered);
        }
        Ok(event.recipients().len())
    }

    /// Deliver `message` to every local session.
    pub fn send_broadcast(
        &self,
        sender: Arc<OnlineUser>,
        message: &str,
    ) -> GameFuture<Result<usize, ChatError>> {
        let this = self.clone();
        let message = message.to_owned();
        self.events
            .game()
            .call(move || this.broadcast_here(sender, &message))
    }

    fn broadcast_here(&self, sender: Arc<OnlineUser>, message: &str) -> Result<usize, ChatError> {
        let dispatched = self
            .events
            .dispatch_here(BroadcastMessage::new(sender.clone(), message));
        if dispatched.cancelled {
            return Err(ChatError::Cancelled);
        }
        let rendered = self
            .formatter
            .format(&self.chat.broadcast_format, &sender)
            .replace("{message}", dispatched.event.message());
        let recipients = self.sessions.all();
        for recipient in &recipients {
            self.sink.deliver(recipient, &rendered);
        }
        info!(player = %sender.username(), recipients = recipients.len(), "Broadcast sent");
        Ok(recipients.len())
    }

    /// A message arriving from an external platform, posted to `channel` by
    /// a synthetic sender. It is never relayed back out.
    pub fn receive_bridged(&self, message: BridgedMessage) -> GameFuture<Result<usize, ChatError>> {
        let sender = Arc::new(OnlineUser::bridged(&message.platform, &message.author));
        self.send_channel_message(sender, &message.channel, &message.content)
    }

    /// Run the filter chain. Each stage that changes the text fires a
    /// `MessageFilter`; cancelling it discards that stage's rewrite.
    fn run_filters(
        &self,
        sender: &Arc<OnlineUser>,
        channel: Option<&str>,
        message: &str,
    ) -> Result<String, ChatError> {
        let mut text = message.to_owned();
        for filter in self.filters.iter() {
            let Some(filtered) = filter.apply(sender, &text) else {
                continue;
            };
            let dispatched = self.events.dispatch_here(MessageFilter::new(
                sender.clone(),
                channel.map(str::to_owned),
                &*text,
                filtered,
                filter.filter_type(),
                filter.name(),
            ));
            if dispatched.cancelled {
                continue;
            }
            let event = dispatched.into_event();
            if event.is_blocked() {
                return Err(ChatError::Blocked {
                    filter: event.filter_name().to_owned(),
                    reason: event.reason().unwrap_or("filtered").to_owned(),
                });
            }
            text = event.filtered().to_owned();
        }
        Ok(text)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Whether `player` may run `command` at all.
    pub fn validate_command_permission(&self, player: &OnlineUser, command: &str) -> bool {
        let (node, default) = match CommandType::from_command(command) {
            CommandType::ChannelSwitch => ("chatlink.command.channel", true),
            CommandType::PrivateMessage => ("chatlink.command.msg", true),
            CommandType::Reply => ("chatlink.command.reply", true),
            CommandType::Broadcast => ("chatlink.command.broadcast", false),
            CommandType::SocialSpy => ("chatlink.command.socialspy", false),
            CommandType::LocalSpy => ("chatlink.command.localspy", false),
            CommandType::OptOutMessage => ("chatlink.command.optout", true),
            CommandType::ChannelShortcut | CommandType::Other => return true,
        };
        self.permissions.has_permission(player.uuid(), node, default)
    }

    /// Run a chat command through PRE listeners, the handler and POST
    /// listeners, then tell the other end of the topology it ran.
    pub fn execute_chat_command(
        &self,
        player: Arc<OnlineUser>,
        command: &str,
        args: Vec<String>,
    ) -> GameFuture<CommandOutcome> {
        let this = self.clone();
        let command = command.to_owned();
        self.events
            .game()
            .call(move || this.command_here(player, &command, args))
    }

    fn command_here(&self, player: Arc<OnlineUser>, command: &str, args: Vec<String>) -> CommandOutcome {
        if !self.validate_command_permission(&player, command) {
            debug!(player = %player.username(), command, "Command denied");
            return CommandOutcome::Denied;
        }

        let pre = self.events.dispatch_here(ChatCommand::new(
            player.clone(),
            command,
            args,
            ExecutionPhase::Pre,
        ));
        if pre.cancelled {
            debug!(player = %player.username(), command, "Command cancelled");
            return CommandOutcome::Cancelled;
        }
        let args = pre.event.args().to_vec();

        let result = self.run_command(&player, pre.event.command_type(), command, &args);

        let mut post = ChatCommand::new(player.clone(), command, args.clone(), ExecutionPhase::Post);
        post.set_successful(result.is_ok());
        if let Err(reason) = &result {
            post.set_failure_reason(Some(reason.clone()));
        }
        self.events.dispatch_here(post);

        let msg = PlayerStatusMessage::command_execution(
            &self.sync.subject_for(&player),
            command,
            &args,
            ExecutionPhase::Post.as_str(),
        );
        self.sync.publish(&msg);

        CommandOutcome::Executed {
            success: result.is_ok(),
        }
    }

    fn run_command(
        &self,
        player: &Arc<OnlineUser>,
        kind: CommandType,
        command: &str,
        args: &[String],
    ) -> Result<(), String> {
        match kind {
            CommandType::ChannelSwitch => {
                let target = args.first().ok_or("usage: /channel <id>")?;
                self.switch_outcome(player, target)
            }
            CommandType::ChannelShortcut => {
                let target = args.first().ok_or("missing shortcut")?;
                let channel = self
                    .channels
                    .by_shortcut(target)
                    .ok_or_else(|| format!("unknown shortcut {target}"))?;
                self.switch_outcome(player, &channel.id)
            }
            CommandType::PrivateMessage => {
                let [recipient, words @ ..] = args else {
                    return Err("usage: /msg <player> <message>".to_owned());
                };
                if words.is_empty() {
                    return Err("usage: /msg <player> <message>".to_owned());
                }
                self.private_message_here(player.clone(), std::slice::from_ref(recipient), &words.join(" "))
                    .map(drop)
                    .map_err(|e| e.to_string())
            }
            CommandType::Broadcast => {
                if args.is_empty() {
                    return Err("usage: /broadcast <message>".to_owned());
                }
                self.broadcast_here(player.clone(), &args.join(" "))
                    .map(drop)
                    .map_err(|e| e.to_string())
            }
            _ => {
                info!(player = %player.username(), command, "Executed command");
                Ok(())
            }
        }
    }

    fn switch_outcome(&self, player: &Arc<OnlineUser>, target: &str) -> Result<(), String> {
        match self
            .switches
            .switch_here(player.clone(), target, SwitchReason::PlayerCommand)
        {
            SwitchOutcome::Switched { .. } => Ok(()),
            SwitchOutcome::Cancelled => Err("switch cancelled".to_owned()),
            SwitchOutcome::UnknownChannel(id) => Err(format!("unknown channel {id}")),
        }
    }

    // ------------------------------------------------------------------
    // Gameplay reports (backend side)
    // ------------------------------------------------------------------

    /// Record a health change of a local player, publish it and tell local
    /// listeners.
    pub fn report_health_change(
        &self,
        player: Arc<OnlineUser>,
        previous: f64,
        new: f64,
        max: f64,
        reason: HealthChangeReason,
        damager: Option<String>,
    ) {
        let msg = PlayerStatusMessage::health_change(
            &self.sync.subject_for(&player),
            previous,
            new,
            max,
            reason.as_str(),
        );
        let ts = msg.timestamp();
        for (status, value) in [
            (chatlink_proto::StatusType::Health, new),
            (chatlink_proto::StatusType::MaxHealth, max),
        ] {
            if let Err(e) = player
                .status()
                .write(status.into(), StatusValue::Float(value), ts, None)
            {
                warn!(key = %status, error = %e, "Rejected health value");
            }
        }
        self.sync.publish(&msg);
        self.events.notify(PlayerHealthChange::new(
            player, previous, new, max, reason, damager,
        ));
    }

    /// Record a move of a local player, publish it and tell local listeners.
    pub fn report_location_change(
        &self,
        player: Arc<OnlineUser>,
        to: PlayerLocation,
        reason: MovementReason,
    ) {
        let previous = player.set_last_location(to.clone());
        let from = previous.clone().unwrap_or_else(|| to.clone());
        let msg = PlayerStatusMessage::location_change(&self.sync.subject_for(&player), &from, &to);
        self.sync.publish(&msg);
        self.events
            .notify(PlayerLocationChange::new(player, previous, to, reason));
    }

    /// Publish a death and fire it locally. The local `PlayerDeath` decides
    /// whether and where the death message is shown.
    pub fn report_death(
        &self,
        player: Arc<OnlineUser>,
        death_message: &str,
        cause: DeathCause,
        killer: Option<Arc<OnlineUser>>,
    ) -> GameFuture<bool> {
        let msg = PlayerStatusMessage::player_death(
            &self.sync.subject_for(&player),
            death_message,
            killer.as_ref().map(|k| k.username()),
        );
        self.sync.publish(&msg);

        let event = PlayerDeath::new(
            player.clone(),
            death_message,
            cause,
            killer,
            player.last_location(),
        );
        let this = self.clone();
        self.events.game().call(move || {
            let done = this.events.dispatch_here(event);
            let ev = &done.event;
            if !ev.should_send_message() {
                return false;
            }
            this.announce(ev.player(), ev.target_channel(), ev.death_message());
            true
        })
    }

    /// Publish a respawn and fire it locally. Resolves to whether a
    /// listener asked for a message and it was shown.
    pub fn report_respawn(
        &self,
        player: Arc<OnlineUser>,
        location: Option<PlayerLocation>,
        reason: RespawnReason,
    ) -> GameFuture<bool> {
        let msg = PlayerStatusMessage::player_respawn(&self.sync.subject_for(&player), reason.as_str());
        self.sync.publish(&msg);
        if let Some(loc) = &location {
            player.set_last_location(loc.clone());
        }

        let event = PlayerRespawn::new(player, location, reason);
        let this = self.clone();
        self.events.game().call(move || {
            let done = this.events.dispatch_here(event);
            let ev = &done.event;
            match (ev.should_send_message(), ev.message()) {
                (true, Some(text)) => {
                    this.announce(ev.player(), ev.target_channel(), text);
                    true
                }
                _ => false,
            }
        })
    }

    fn announce(&self, player: &OnlineUser, channel: Option<&str>, text: &str) {
        let channel = channel
            .map(str::to_owned)
            .or_else(|| self.channels.channel_of(player.uuid()))
            .unwrap_or_else(|| self.channels.default_channel());
        let delivered =
            self.channels
                .deliver_to_members(&channel, &self.sessions, self.sink.as_ref(), text);
        debug!(channel = %channel, delivered, "Announcement delivered");
    }
}

fn is_bridged(user: &OnlineUser) -> bool {
    user.identity().origin.starts_with("bridge:")
}
