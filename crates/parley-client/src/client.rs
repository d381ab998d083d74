//! Client state machine.
//!
//! The `Client` owns the whole session and is the only writer of it. Each
//! [`ClientEvent`] is one atomic transition; the returned [`ClientAction`]s
//! are executed by the runtime after the transition completes.

use parley_core::{
    ConnectionAction, ConnectionManager, ConnectionState, DisconnectKind, Identity, TimerRegistry,
    TimerSlot, env::Environment,
};
use parley_proto::{ConversationId, GatewayEvent, MessageStatus, NewMessage, UserId, UserTyping};

use crate::{
    config::SyncConfig,
    dispatcher::Dispatcher,
    error::ClientError,
    event::{ClientAction, ClientEvent},
    index::ConversationIndex,
    reconciler::{Applied, MessageCache},
    snapshot::SessionSnapshot,
    state::{Conversation, Message, MessageKey},
    typing::{LocalTyping, RemoteTyping, TypingSignal},
};

/// Conversation sync engine.
pub struct Client<E: Environment> {
    env: E,
    config: SyncConfig,
    connection: ConnectionManager,
    timers: TimerRegistry,
    identity: Option<Identity>,
    conversations: ConversationIndex,
    messages: MessageCache,
    remote_typing: RemoteTyping<E::Instant>,
    local_typing: LocalTyping,
    dispatcher: Dispatcher,
    active: Option<ConversationId>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client with no session state.
    pub fn new(env: E, config: SyncConfig) -> Self {
        Self {
            env,
            connection: ConnectionManager::new(config.reconnect),
            timers: TimerRegistry::new(),
            identity: None,
            conversations: ConversationIndex::new(),
            messages: MessageCache::new(config.message_cache_limit),
            remote_typing: RemoteTyping::new(),
            local_typing: LocalTyping::new(),
            dispatcher: Dispatcher::new(),
            active: None,
            config,
        }
    }

    /// Process one event.
    ///
    /// Errors are logged here and never returned: a failed transition leaves
    /// the session as it was and produces no [`ClientAction::Publish`].
    pub fn handle(&mut self, event: ClientEvent<E::Instant>) -> Vec<ClientAction> {
        let before = (self.connection.state(), self.connection.last_disconnect().cloned());
        let mut actions = Vec::new();

        let changed = match self.apply(event, &mut actions) {
            Ok(changed) => changed,
            Err(err) => {
                report(&err);
                false
            },
        };

        self.flush_emissions(&mut actions);
        let after = (self.connection.state(), self.connection.last_disconnect().cloned());
        if changed || before != after {
            actions.push(ClientAction::Publish);
        }
        actions
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Local identity, set on handshake.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Conversations, most recent activity first.
    pub fn conversations(&self) -> &[Conversation] {
        self.conversations.as_slice()
    }

    /// Cached messages of a conversation, oldest first.
    pub fn messages(&self, conversation_id: ConversationId) -> &[Message] {
        self.messages.messages(conversation_id)
    }

    /// Usernames typing in a conversation.
    pub fn typing(&self, conversation_id: ConversationId) -> Vec<String> {
        self.remote_typing.usernames(conversation_id)
    }

    /// Conversation the user has open.
    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.active
    }

    /// True if another explicit retry of this message is allowed.
    pub fn can_retry(&self, conversation_id: ConversationId, key: &MessageKey) -> bool {
        self.messages
            .get(conversation_id, key)
            .is_some_and(|m| m.can_retry(self.config.max_send_retries))
    }

    /// True if older history pages of a conversation can still be loaded.
    pub fn has_more_history(&self, conversation_id: ConversationId) -> bool {
        self.messages.has_more(conversation_id)
    }

    /// True if a timer is armed in `slot`.
    pub fn timer_armed(&self, slot: TimerSlot) -> bool {
        self.timers.is_armed(slot)
    }

    /// Emissions dropped because the connection was down.
    pub fn dropped_emissions(&self) -> u64 {
        self.dispatcher.dropped()
    }

    /// Immutable view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection_state: self.connection.state(),
            last_disconnect: self.connection.last_disconnect().cloned(),
            identity: self.identity.clone(),
            conversations: self.conversations.as_slice().to_vec(),
            active_conversation: self.active,
            messages_by_conversation: self
                .messages
                .iter()
                .filter(|(_, messages)| !messages.is_empty())
                .map(|(id, messages)| (id, messages.to_vec()))
                .collect(),
            older_history: self
                .messages
                .iter()
                .map(|(id, _)| id)
                .filter(|&id| self.messages.has_more(id))
                .collect(),
            typing_by_conversation: self.remote_typing.snapshot(),
        }
    }

    fn apply(
        &mut self,
        event: ClientEvent<E::Instant>,
        actions: &mut Vec<ClientAction>,
    ) -> Result<bool, ClientError> {
        match event {
            ClientEvent::Connect => {
                let connection_actions = self.connection.connect();
                self.run_connection(connection_actions, actions);
                Ok(false)
            },
            ClientEvent::Disconnect => {
                self.stop_local_typing(actions);
                let connection_actions = self.connection.disconnect();
                self.run_connection(connection_actions, actions);
                self.remote_typing.clear();
                Ok(true)
            },
            ClientEvent::Logout => {
                self.logout(actions);
                Ok(true)
            },
            ClientEvent::CredentialsResolved(credentials) => {
                let connection_actions = self.connection.credentials_resolved(credentials)?;
                self.run_connection(connection_actions, actions);
                Ok(false)
            },
            ClientEvent::FrameReceived(frame) => {
                let event = GatewayEvent::decode(&frame)?;
                self.apply_gateway(event, actions)
            },
            ClientEvent::TransportLost { reason } => {
                Ok(self.on_disconnect(DisconnectKind::Transient, reason, actions))
            },
            ClientEvent::SendMessage { conversation_id, content } => {
                self.send(conversation_id, content, actions)
            },
            ClientEvent::RetryMessage { conversation_id, key } => self.retry(conversation_id, key),
            ClientEvent::Keystroke { conversation_id } => {
                for signal in self.local_typing.keystroke(conversation_id) {
                    self.signal(signal);
                }
                let token = self.timers.arm(TimerSlot::Typing);
                actions.push(ClientAction::StartTimer {
                    slot: TimerSlot::Typing,
                    token,
                    delay: self.config.typing_idle,
                });
                Ok(false)
            },
            ClientEvent::SetActiveConversation(conversation_id) => {
                Ok(self.set_active(conversation_id, actions))
            },
            ClientEvent::JoinConversation { conversation_id } => {
                self.dispatcher.join_conversation(self.connection.state(), conversation_id);
                Ok(false)
            },
            ClientEvent::MarkRead { conversation_id } => self.mark_read(conversation_id, actions),
            ClientEvent::ConversationsLoaded(conversations) => {
                self.conversations.load(conversations);
                Ok(true)
            },
            ClientEvent::LoadOlderHistory { conversation_id } => {
                match self.messages.continue_history(conversation_id) {
                    Some(page) => {
                        actions.push(ClientAction::FetchHistory { conversation_id, page });
                    },
                    None => tracing::debug!(conversation_id, "no older history to load"),
                }
                Ok(false)
            },
            ClientEvent::HistoryLoaded { conversation_id, page } => {
                self.messages.merge_history(conversation_id, page);
                Ok(true)
            },
            ClientEvent::HistoryUnavailable { conversation_id } => {
                self.messages.history_failed(conversation_id);
                Ok(false)
            },
            ClientEvent::ConversationCreated(conversation) => {
                self.conversations.prepend(conversation);
                Ok(true)
            },
            ClientEvent::TimerFired { slot, token } => {
                if !self.timers.fire(slot, token) {
                    tracing::debug!(?slot, token = token.get(), "stale timer ignored");
                    return Ok(false);
                }
                match slot {
                    TimerSlot::Reconnect => {
                        let connection_actions = self.connection.reconnect_due();
                        self.run_connection(connection_actions, actions);
                    },
                    TimerSlot::Typing => {
                        if let Some(signal) = self.local_typing.idle() {
                            self.signal(signal);
                        }
                    },
                }
                Ok(false)
            },
            ClientEvent::Tick { now } => {
                Ok(self.remote_typing.expire(now, self.config.presence_ttl))
            },
        }
    }

    fn apply_gateway(
        &mut self,
        event: GatewayEvent,
        actions: &mut Vec<ClientAction>,
    ) -> Result<bool, ClientError> {
        match event {
            GatewayEvent::Connect => self.handshake(),
            GatewayEvent::Connected(_) => {
                if self.connection.state() == ConnectionState::Connecting {
                    self.handshake()
                } else {
                    tracing::debug!("connected ack for an established session");
                    Ok(false)
                }
            },
            GatewayEvent::Disconnect(disconnect) => {
                let kind = DisconnectKind::from(&disconnect.classify());
                Ok(self.on_disconnect(kind, disconnect.reason, actions))
            },
            GatewayEvent::NewMessage(payload) => Ok(self.on_new_message(&payload)),
            GatewayEvent::UserTyping(typing) => Ok(self.on_user_typing(&typing)),
            GatewayEvent::Error(payload) => {
                if !payload.is_empty() {
                    tracing::warn!(
                        message = payload.message().unwrap_or("<none>"),
                        payload = ?payload.0,
                        "gateway reported an error"
                    );
                }
                Ok(false)
            },
        }
    }

    fn handshake(&mut self) -> Result<bool, ClientError> {
        self.connection.handshake()?;
        self.identity = self.connection.identity().cloned();

        // Subscriptions do not survive the transport.
        if let Some(conversation_id) = self.active {
            self.dispatcher.join_conversation(self.connection.state(), conversation_id);
        }
        Ok(true)
    }

    fn on_disconnect(
        &mut self,
        kind: DisconnectKind,
        reason: String,
        actions: &mut Vec<ClientAction>,
    ) -> bool {
        let was_live = self.connection.state() != ConnectionState::Disconnected;
        let connection_actions = self.connection.handle_disconnect(kind, reason.as_str());
        self.run_connection(connection_actions, actions);

        if !was_live {
            return false;
        }

        self.stop_local_typing(actions);
        self.remote_typing.clear();
        if let Some(err) = ClientError::disconnect(kind, reason) {
            report(&err);
        }
        true
    }

    fn on_new_message(&mut self, payload: &NewMessage) -> bool {
        let local_user = self.local_user_id();
        let applied = self.messages.apply_confirmed(payload, local_user);

        if payload.status == MessageStatus::Failed && Some(payload.sender_id) == local_user {
            report(&ClientError::SendFailure {
                conversation_id: payload.conversation_id,
                key: payload.confirmed_id().map_or_else(
                    || MessageKey::Temp(payload.temp_id().unwrap_or_default().to_owned()),
                    MessageKey::Id,
                ),
                reason: "gateway reported failure".into(),
            });
        }

        if applied.is_new()
            && !self.conversations.record_message(
                payload.conversation_id,
                payload.created_at,
                payload.sender_id,
                local_user,
            )
        {
            tracing::debug!(
                conversation_id = payload.conversation_id,
                "message for a conversation that is not loaded"
            );
        }

        !matches!(applied, Applied::Duplicate | Applied::Stale)
    }

    fn on_user_typing(&mut self, typing: &UserTyping) -> bool {
        if Some(typing.user_id) == self.local_user_id() {
            tracing::trace!("own typing echo ignored");
            return false;
        }
        self.remote_typing.apply(typing, self.env.now())
    }

    fn send(
        &mut self,
        conversation_id: ConversationId,
        content: String,
        actions: &mut Vec<ClientAction>,
    ) -> Result<bool, ClientError> {
        let sender_id = self.local_user_id().ok_or(ClientError::NoIdentity)?;
        self.stop_local_typing(actions);

        let temp_id = self.messages.next_temp_id();
        self.dispatcher.send_message(self.connection.state(), conversation_id, &content, &temp_id);
        self.messages.push_optimistic(Message::optimistic(
            conversation_id,
            sender_id,
            content,
            temp_id,
            self.env.wall_clock(),
        ));
        Ok(true)
    }

    fn retry(
        &mut self,
        conversation_id: ConversationId,
        key: MessageKey,
    ) -> Result<bool, ClientError> {
        let max_retries = self.config.max_send_retries;
        let local_user = self.local_user_id();
        let Some(message) = self.messages.get(conversation_id, &key) else {
            return Err(ClientError::UnknownMessage { conversation_id, key });
        };

        if !matches!(message.status, MessageStatus::Sending | MessageStatus::Failed)
            || Some(message.sender_id) != local_user
        {
            tracing::debug!(?key, status = %message.status, "nothing to retry");
            return Ok(false);
        }

        if message.retry_count >= max_retries {
            let changed = message.status != MessageStatus::Failed;
            if let Some(message) = self.messages.get_mut(conversation_id, &key) {
                message.status = MessageStatus::Failed;
            }
            report(&ClientError::SendFailure {
                conversation_id,
                key,
                reason: format!("retry limit of {max_retries} reached"),
            });
            return Ok(changed);
        }

        let temp_id = match message.client_temp_id.clone() {
            Some(temp_id) => temp_id,
            None => self.messages.next_temp_id(),
        };
        let Some(message) = self.messages.get_mut(conversation_id, &key) else {
            return Err(ClientError::UnknownMessage { conversation_id, key });
        };

        message.retry_count += 1;
        message.status = MessageStatus::Sending;
        message.id = 0;
        message.client_temp_id = Some(temp_id.clone());
        let content = message.content.clone();
        tracing::debug!(conversation_id, %temp_id, attempt = message.retry_count, "retrying send");

        self.dispatcher.send_message(self.connection.state(), conversation_id, &content, &temp_id);
        Ok(true)
    }

    fn set_active(
        &mut self,
        conversation_id: Option<ConversationId>,
        actions: &mut Vec<ClientAction>,
    ) -> bool {
        if self.active == conversation_id {
            return false;
        }

        self.stop_local_typing(actions);
        self.active = conversation_id;

        if let Some(id) = conversation_id {
            self.dispatcher.join_conversation(self.connection.state(), id);
            if let Some(page) = self.messages.start_history(id) {
                actions.push(ClientAction::FetchHistory { conversation_id: id, page });
            }
        }
        true
    }

    fn mark_read(
        &mut self,
        conversation_id: ConversationId,
        actions: &mut Vec<ClientAction>,
    ) -> Result<bool, ClientError> {
        let previous = self
            .conversations
            .mark_read(conversation_id)
            .ok_or(ClientError::UnknownConversation(conversation_id))?;
        let mut changed = previous > 0;

        if let Some(local_user) = self.local_user_id()
            && let Some(message) = self.messages.latest_unread_inbound(conversation_id, local_user)
        {
            message.status = MessageStatus::Read;
            actions.push(ClientAction::UpdateMessageStatus {
                message_id: message.id,
                status: MessageStatus::Read,
            });
            changed = true;
        }
        Ok(changed)
    }

    fn logout(&mut self, actions: &mut Vec<ClientAction>) {
        self.stop_local_typing(actions);
        let connection_actions = self.connection.reset();
        self.run_connection(connection_actions, actions);

        for slot in [TimerSlot::Reconnect, TimerSlot::Typing] {
            if self.timers.disarm(slot) {
                actions.push(ClientAction::CancelTimer { slot });
            }
        }

        self.identity = None;
        self.active = None;
        self.conversations.clear();
        self.messages.clear();
        self.remote_typing.clear();
        tracing::info!("session cleared");
    }

    fn stop_local_typing(&mut self, actions: &mut Vec<ClientAction>) {
        if let Some(signal) = self.local_typing.cancel() {
            self.signal(signal);
        }
        if self.timers.disarm(TimerSlot::Typing) {
            actions.push(ClientAction::CancelTimer { slot: TimerSlot::Typing });
        }
    }

    fn signal(&mut self, signal: TypingSignal) {
        let state = self.connection.state();
        match signal {
            TypingSignal::Start(id) => self.dispatcher.set_typing(state, id, true),
            TypingSignal::Stop(id) => self.dispatcher.set_typing(state, id, false),
        }
    }

    /// Translate connection actions. Pending emissions go out first so they
    /// precede a close.
    fn run_connection(
        &mut self,
        connection_actions: Vec<ConnectionAction>,
        actions: &mut Vec<ClientAction>,
    ) {
        self.flush_emissions(actions);

        for action in connection_actions {
            match action {
                ConnectionAction::ResolveCredentials => {
                    actions.push(ClientAction::ResolveCredentials);
                },
                ConnectionAction::Open { token } => {
                    actions.push(ClientAction::OpenConnection { token });
                },
                ConnectionAction::Close => actions.push(ClientAction::CloseConnection),
                ConnectionAction::ScheduleReconnect { delay, attempt } => {
                    let token = self.timers.arm(TimerSlot::Reconnect);
                    tracing::debug!(attempt, ?delay, "reconnect timer armed");
                    actions.push(ClientAction::StartTimer {
                        slot: TimerSlot::Reconnect,
                        token,
                        delay,
                    });
                },
                ConnectionAction::CancelReconnect => {
                    if self.timers.disarm(TimerSlot::Reconnect) {
                        actions.push(ClientAction::CancelTimer { slot: TimerSlot::Reconnect });
                    }
                },
            }
        }
    }

    fn flush_emissions(&mut self, actions: &mut Vec<ClientAction>) {
        actions.extend(self.dispatcher.drain().into_iter().map(ClientAction::Emit));
    }

    fn local_user_id(&self) -> Option<UserId> {
        self.identity.as_ref().or_else(|| self.connection.identity()).map(|i| i.id)
    }
}

fn report(err: &ClientError) {
    match err {
        ClientError::MalformedEvent(_) | ClientError::SendFailure { .. } => {
            tracing::warn!(error = %err, "event dropped");
        },
        ClientError::TransientDisconnect { .. } | ClientError::TerminalDisconnect { .. } => {
            tracing::info!(error = %err, "disconnected");
        },
        ClientError::ConnectionUnavailable(_)
        | ClientError::Connection(_)
        | ClientError::UnknownMessage { .. }
        | ClientError::UnknownConversation(_)
        | ClientError::NoIdentity => {
            tracing::debug!(error = %err, "event ignored");
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::{TimeZone, Utc};
    use parley_core::{Credentials, Role, env::test_utils::MockEnv};
    use parley_proto::{Disconnect, GatewayFrame, OutboundEvent};
    use serde_json::json;

    use super::*;
    use crate::state::HistoryPage;

    const LOCAL: UserId = 7;

    fn creds() -> Credentials {
        Credentials::new("token-7", Identity::new(LOCAL, "ana", Role::Customer))
    }

    fn gateway(event: GatewayEvent) -> ClientEvent<Instant> {
        ClientEvent::FrameReceived(event.into_frame().unwrap())
    }

    fn new_message(id: u64, sender: UserId, temp: Option<&str>) -> ClientEvent<Instant> {
        gateway(GatewayEvent::NewMessage(NewMessage {
            id: Some(id),
            message_id: Some(id),
            conversation_id: 42,
            sender_id: sender,
            content: "hi".into(),
            status: MessageStatus::Sent,
            created_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).single().unwrap(),
            temp_id: temp.map(str::to_owned),
        }))
    }

    fn emitted(actions: &[ClientAction]) -> Vec<OutboundEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                ClientAction::Emit(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn timer_token(actions: &[ClientAction], wanted: TimerSlot) -> parley_core::TimerToken {
        actions
            .iter()
            .find_map(|a| match a {
                ClientAction::StartTimer { slot, token, .. } if *slot == wanted => Some(*token),
                _ => None,
            })
            .unwrap()
    }

    fn connected() -> (Client<MockEnv>, MockEnv) {
        let env = MockEnv::new();
        let mut client = Client::new(env.clone(), SyncConfig::default());
        client.handle(ClientEvent::Connect);
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));
        client.handle(gateway(GatewayEvent::Connect));
        client.handle(ClientEvent::ConversationsLoaded(vec![Conversation::new(
            42,
            LOCAL,
            9,
            Utc.timestamp_opt(1_600_000_000, 0).single().unwrap(),
        )]));
        (client, env)
    }

    #[test]
    fn connect_flow() {
        let env = MockEnv::new();
        let mut client = Client::new(env, SyncConfig::default());

        assert_eq!(client.handle(ClientEvent::Connect), vec![ClientAction::ResolveCredentials]);

        let actions = client.handle(ClientEvent::CredentialsResolved(Some(creds())));
        assert_eq!(actions, vec![
            ClientAction::OpenConnection { token: "token-7".into() },
            ClientAction::Publish
        ]);
        assert_eq!(client.connection_state(), ConnectionState::Connecting);
        assert!(client.identity().is_none());

        let actions = client.handle(gateway(GatewayEvent::Connect));
        assert_eq!(actions, vec![ClientAction::Publish]);
        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert_eq!(client.identity().map(|i| i.id), Some(LOCAL));
    }

    #[test]
    fn missing_credentials_abort_silently() {
        let mut client = Client::new(MockEnv::new(), SyncConfig::default());
        client.handle(ClientEvent::Connect);
        let actions = client.handle(ClientEvent::CredentialsResolved(None));
        assert!(actions.is_empty());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn connected_ack_completes_handshake() {
        let mut client = Client::new(MockEnv::new(), SyncConfig::default());
        client.handle(ClientEvent::Connect);
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));

        let ack = GatewayFrame::new("connected", json!({"ack": true}));
        client.handle(ClientEvent::FrameReceived(ack.clone()));
        assert_eq!(client.connection_state(), ConnectionState::Connected);

        // A second ack is harmless.
        assert!(client.handle(ClientEvent::FrameReceived(ack)).is_empty());
    }

    #[test]
    fn optimistic_send_then_confirmation() {
        let (mut client, _env) = connected();

        let actions = client
            .handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        assert_eq!(emitted(&actions), vec![OutboundEvent::send(42, "hi", "temp_1")]);

        let messages = client.messages(42);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 0);
        assert_eq!(messages[0].client_temp_id.as_deref(), Some("temp_1"));
        assert_eq!(messages[0].status, MessageStatus::Sending);

        let actions = client.handle(new_message(501, LOCAL, Some("temp_1")));
        assert!(actions.contains(&ClientAction::Publish));

        let messages = client.messages(42);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 501);
        assert_eq!(messages[0].status, MessageStatus::Sent);
        assert_eq!(client.conversations()[0].unread_count, 0);
    }

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let (mut client, _env) = connected();
        client.handle(new_message(77, 9, None));
        let actions = client.handle(new_message(77, 9, None));

        assert!(actions.is_empty());
        assert_eq!(client.messages(42).len(), 1);
        assert_eq!(client.conversations()[0].unread_count, 1);
    }

    #[test]
    fn replay_after_eviction_is_not_counted() {
        let (mut client, _env) = connected();
        for id in 1..=101 {
            client.handle(new_message(id, 9, None));
        }
        assert_eq!(client.conversations()[0].unread_count, 101);

        assert!(client.handle(new_message(1, 9, None)).is_empty());

        let messages = client.messages(42);
        assert_eq!(client.conversations()[0].unread_count, 101);
        assert_eq!(messages.len(), 100);
        assert_eq!(messages.first().map(|m| m.id), Some(2));
        assert_eq!(messages.last().map(|m| m.id), Some(101));
    }

    #[test]
    fn send_while_disconnected_stays_local() {
        let env = MockEnv::new();
        let mut client = Client::new(env, SyncConfig::default());
        client.handle(ClientEvent::Connect);
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));

        let actions = client
            .handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        assert!(emitted(&actions).is_empty());
        assert_eq!(client.messages(42)[0].status, MessageStatus::Sending);
        assert_eq!(client.dropped_emissions(), 1);
    }

    #[test]
    fn send_without_identity_is_ignored() {
        let mut client = Client::new(MockEnv::new(), SyncConfig::default());
        let actions = client
            .handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        assert!(actions.is_empty());
        assert!(client.messages(42).is_empty());
    }

    #[test]
    fn malformed_frame_leaves_state_untouched() {
        let (mut client, _env) = connected();
        let before = client.snapshot();

        let bad = GatewayFrame::new("new_message", json!({"conversation_id": "forty-two"}));
        assert!(client.handle(ClientEvent::FrameReceived(bad)).is_empty());
        let unknown = ClientEvent::FrameReceived(GatewayFrame::bare("surprise"));
        assert!(client.handle(unknown).is_empty());

        assert_eq!(client.snapshot(), before);
    }

    #[test]
    fn transient_disconnect_schedules_reconnect() {
        let (mut client, _env) = connected();
        let disconnect = Disconnect::new("ping timeout");
        let actions = client.handle(gateway(GatewayEvent::Disconnect(disconnect)));

        assert!(actions.iter().any(|a| matches!(a, ClientAction::StartTimer {
            slot: TimerSlot::Reconnect,
            delay,
            ..
        } if *delay == Duration::from_secs(1))));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        let token = timer_token(&actions, TimerSlot::Reconnect);
        let actions = client.handle(ClientEvent::TimerFired { slot: TimerSlot::Reconnect, token });
        assert_eq!(actions, vec![ClientAction::ResolveCredentials]);
    }

    #[test]
    fn server_disconnect_is_terminal() {
        let (mut client, _env) = connected();
        let disconnect = Disconnect::new(Disconnect::SERVER_INITIATED);
        let actions = client.handle(gateway(GatewayEvent::Disconnect(disconnect)));

        assert_eq!(actions, vec![ClientAction::Publish]);
        let last = client.snapshot().last_disconnect.unwrap();
        assert_eq!(last.kind, DisconnectKind::Terminal);
        assert_eq!(last.reason, Disconnect::SERVER_INITIATED);
        assert!(!client.timer_armed(TimerSlot::Reconnect));
    }

    #[test]
    fn unrequested_client_disconnect_reconnects() {
        let (mut client, _env) = connected();
        let disconnect = Disconnect::new(Disconnect::CLIENT_INITIATED);
        let actions = client.handle(gateway(GatewayEvent::Disconnect(disconnect)));

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(client.timer_armed(TimerSlot::Reconnect));
        assert!(actions.contains(&ClientAction::Publish));

        let last = client.snapshot().last_disconnect.unwrap();
        assert_eq!(last.kind, DisconnectKind::Transient);
        assert_eq!(last.reason, "io client disconnect");
    }

    #[test]
    fn transport_loss_reason_is_published() {
        let (mut client, _env) = connected();
        client.handle(ClientEvent::TransportLost { reason: "connection reset".into() });
        let last = client.snapshot().last_disconnect.unwrap();
        assert_eq!(last.kind, DisconnectKind::Transient);
        assert_eq!(last.reason, "connection reset");

        client.handle(ClientEvent::Disconnect);
        let last = client.snapshot().last_disconnect.unwrap();
        assert_eq!(last.kind, DisconnectKind::Local);
    }

    #[test]
    fn transport_loss_while_connecting_is_transient() {
        let mut client = Client::new(MockEnv::new(), SyncConfig::default());
        client.handle(ClientEvent::Connect);
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));

        client.handle(ClientEvent::TransportLost { reason: "connection refused".into() });
        assert!(client.timer_armed(TimerSlot::Reconnect));
    }

    #[test]
    fn typing_debounce() {
        let (mut client, _env) = connected();

        let actions = client.handle(ClientEvent::Keystroke { conversation_id: 42 });
        assert_eq!(emitted(&actions), vec![OutboundEvent::typing(42, true)]);
        let first = timer_token(&actions, TimerSlot::Typing);

        let actions = client.handle(ClientEvent::Keystroke { conversation_id: 42 });
        assert!(emitted(&actions).is_empty());
        let second = timer_token(&actions, TimerSlot::Typing);

        let stale =
            client.handle(ClientEvent::TimerFired { slot: TimerSlot::Typing, token: first });
        assert!(stale.is_empty());

        let actions =
            client.handle(ClientEvent::TimerFired { slot: TimerSlot::Typing, token: second });
        assert_eq!(emitted(&actions), vec![OutboundEvent::typing(42, false)]);
    }

    #[test]
    fn switching_conversation_stops_typing_once() {
        let (mut client, _env) = connected();
        client.handle(ClientEvent::SetActiveConversation(Some(42)));
        client.handle(ClientEvent::Keystroke { conversation_id: 42 });

        let actions = client.handle(ClientEvent::SetActiveConversation(Some(43)));
        assert_eq!(emitted(&actions), vec![
            OutboundEvent::typing(42, false),
            OutboundEvent::join(43)
        ]);
        assert!(actions.contains(&ClientAction::CancelTimer { slot: TimerSlot::Typing }));
        assert!(!client.timer_armed(TimerSlot::Typing));

        let actions = client.handle(ClientEvent::SetActiveConversation(Some(42)));
        assert_eq!(emitted(&actions), vec![OutboundEvent::join(42)]);
    }

    #[test]
    fn sending_stops_typing() {
        let (mut client, _env) = connected();
        client.handle(ClientEvent::Keystroke { conversation_id: 42 });

        let actions = client
            .handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        assert_eq!(emitted(&actions), vec![
            OutboundEvent::typing(42, false),
            OutboundEvent::send(42, "hi", "temp_1")
        ]);
    }

    #[test]
    fn activating_conversation_fetches_history_once() {
        let (mut client, _env) = connected();
        let actions = client.handle(ClientEvent::SetActiveConversation(Some(42)));
        assert!(actions.contains(&ClientAction::FetchHistory { conversation_id: 42, page: 1 }));

        client.handle(ClientEvent::SetActiveConversation(None));
        let actions = client.handle(ClientEvent::SetActiveConversation(Some(42)));
        assert!(!actions.iter().any(|a| matches!(a, ClientAction::FetchHistory { .. })));
    }

    #[test]
    fn older_history_is_paged_on_request() {
        let (mut client, _env) = connected();
        let fetches = |actions: &[ClientAction]| -> Vec<u32> {
            actions
                .iter()
                .filter_map(|a| match a {
                    ClientAction::FetchHistory { conversation_id: 42, page } => Some(*page),
                    _ => None,
                })
                .collect()
        };
        let page = |id: u64, has_next| ClientEvent::HistoryLoaded {
            conversation_id: 42,
            page: HistoryPage {
                messages: vec![Message::confirmed(&NewMessage {
                    id: Some(id),
                    message_id: None,
                    conversation_id: 42,
                    sender_id: 9,
                    content: "old".into(),
                    status: MessageStatus::Read,
                    created_at: Utc.timestamp_opt(1_600_000_000 + id as i64, 0).single().unwrap(),
                    temp_id: None,
                })
                .unwrap()],
                has_next,
            },
        };
        let older = ClientEvent::LoadOlderHistory { conversation_id: 42 };

        assert_eq!(fetches(&client.handle(ClientEvent::SetActiveConversation(Some(42)))), vec![1]);
        assert!(fetches(&client.handle(older.clone())).is_empty());

        client.handle(page(20, true));
        assert!(client.has_more_history(42));
        assert!(client.snapshot().older_history.contains(&42));
        assert_eq!(fetches(&client.handle(older.clone())), vec![2]);

        client.handle(ClientEvent::HistoryUnavailable { conversation_id: 42 });
        assert_eq!(fetches(&client.handle(older.clone())), vec![2]);

        client.handle(page(10, false));
        assert!(!client.has_more_history(42));
        assert!(client.snapshot().older_history.is_empty());
        assert!(fetches(&client.handle(older)).is_empty());

        let ids: Vec<_> = client.messages(42).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn remote_typing_ignores_self_and_expires() {
        let (mut client, env) = connected();
        let typing = |user_id, username: &str| {
            gateway(GatewayEvent::UserTyping(UserTyping {
                conversation_id: 42,
                user_id,
                username: username.into(),
                is_typing: true,
            }))
        };

        assert!(client.handle(typing(LOCAL, "ana")).is_empty());
        assert_eq!(client.handle(typing(9, "bo")), vec![ClientAction::Publish]);
        assert_eq!(client.typing(42), vec!["bo".to_string()]);

        env.advance(Duration::from_secs(3));
        let actions = client.handle(ClientEvent::Tick { now: env.now() });
        assert_eq!(actions, vec![ClientAction::Publish]);
        assert!(client.typing(42).is_empty());
    }

    #[test]
    fn retry_is_bounded() {
        let mut config = SyncConfig::default();
        config.max_send_retries = 2;
        let mut client = Client::new(MockEnv::new(), config);
        client.handle(ClientEvent::Connect);
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));
        client.handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        let key = MessageKey::Temp("temp_1".into());

        for attempt in 1..=2 {
            assert!(client.can_retry(42, &key));
            client.handle(ClientEvent::RetryMessage { conversation_id: 42, key: key.clone() });
            assert_eq!(client.messages(42)[0].retry_count, attempt);
        }

        assert!(!client.can_retry(42, &key));
        let actions =
            client.handle(ClientEvent::RetryMessage { conversation_id: 42, key: key.clone() });
        assert_eq!(actions, vec![ClientAction::Publish]);
        assert_eq!(client.messages(42)[0].status, MessageStatus::Failed);
        assert!(!client.can_retry(42, &key));
    }

    #[test]
    fn retry_resends_failed_confirmation() {
        let (mut client, _env) = connected();
        client.handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        client.handle(gateway(GatewayEvent::NewMessage(NewMessage {
            id: Some(900),
            message_id: None,
            conversation_id: 42,
            sender_id: LOCAL,
            content: "hi".into(),
            status: MessageStatus::Failed,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
            temp_id: Some("temp_1".into()),
        })));
        assert_eq!(client.messages(42)[0].status, MessageStatus::Failed);

        let retry = ClientEvent::RetryMessage { conversation_id: 42, key: MessageKey::Id(900) };
        let actions = client.handle(retry);
        assert_eq!(emitted(&actions), vec![OutboundEvent::send(42, "hi", "temp_1")]);
        assert_eq!(client.messages(42)[0].status, MessageStatus::Sending);

        client.handle(new_message(901, LOCAL, Some("temp_1")));
        let messages = client.messages(42);
        assert_eq!(messages.len(), 1);
        assert_eq!((messages[0].id, messages[0].retry_count), (901, 1));
    }

    #[test]
    fn retry_unknown_message_is_ignored() {
        let (mut client, _env) = connected();
        let actions = client
            .handle(ClientEvent::RetryMessage { conversation_id: 42, key: MessageKey::Id(1) });
        assert!(actions.is_empty());
    }

    #[test]
    fn mark_read_clears_unread_and_updates_directory() {
        let (mut client, _env) = connected();
        client.handle(new_message(10, 9, None));
        client.handle(new_message(11, 9, None));
        assert_eq!(client.conversations()[0].unread_count, 2);

        let actions = client.handle(ClientEvent::MarkRead { conversation_id: 42 });
        assert!(actions.contains(&ClientAction::UpdateMessageStatus {
            message_id: 11,
            status: MessageStatus::Read
        }));
        assert_eq!(client.conversations()[0].unread_count, 0);
        assert_eq!(client.messages(42)[1].status, MessageStatus::Read);

        assert!(client.handle(ClientEvent::MarkRead { conversation_id: 99 }).is_empty());
    }

    #[test]
    fn history_merges_with_live_messages() {
        let (mut client, _env) = connected();
        client.handle(new_message(5, 9, None));

        let older = Message::confirmed(&NewMessage {
            id: Some(1),
            message_id: None,
            conversation_id: 42,
            sender_id: 9,
            content: "first".into(),
            status: MessageStatus::Read,
            created_at: Utc.timestamp_opt(1_600_000_100, 0).single().unwrap(),
            temp_id: None,
        })
        .unwrap();
        client.handle(ClientEvent::HistoryLoaded {
            conversation_id: 42,
            page: HistoryPage { messages: vec![older], has_next: false },
        });

        let ids: Vec<_> = client.messages(42).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn reconnect_rejoins_active_conversation() {
        let (mut client, _env) = connected();
        client.handle(ClientEvent::SetActiveConversation(Some(42)));
        let actions = client.handle(ClientEvent::TransportLost { reason: "reset".into() });
        let token = timer_token(&actions, TimerSlot::Reconnect);

        client.handle(ClientEvent::TimerFired { slot: TimerSlot::Reconnect, token });
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));
        let actions = client.handle(gateway(GatewayEvent::Connect));
        assert_eq!(emitted(&actions), vec![OutboundEvent::join(42)]);
    }

    #[test]
    fn logout_clears_everything() {
        let (mut client, _env) = connected();
        client.handle(ClientEvent::SendMessage { conversation_id: 42, content: "hi".into() });
        client.handle(ClientEvent::Keystroke { conversation_id: 42 });
        client.handle(new_message(1, 9, None));

        let actions = client.handle(ClientEvent::Logout);
        let close = actions.iter().position(|a| *a == ClientAction::CloseConnection).unwrap();
        let stop = actions
            .iter()
            .position(|a| *a == ClientAction::Emit(OutboundEvent::typing(42, false)))
            .unwrap();
        assert!(stop < close);

        assert_eq!(client.snapshot(), SessionSnapshot::default());
        assert!(!client.timer_armed(TimerSlot::Typing));

        // Correlation ids keep counting across sessions.
        client.handle(ClientEvent::Connect);
        client.handle(ClientEvent::CredentialsResolved(Some(creds())));
        client.handle(ClientEvent::SendMessage { conversation_id: 42, content: "x".into() });
        assert_eq!(client.messages(42)[0].client_temp_id.as_deref(), Some("temp_2"));
    }
}
