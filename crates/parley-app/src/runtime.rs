//! Event loop around the sync engine.
//!
//! The runtime is the only task that touches the [`Client`]. It waits on four
//! sources with `select!` (user commands, timer firings, gateway frames, the
//! housekeeping tick), turns each into one [`ClientEvent`], and executes the
//! resulting actions. Actions that produce results (credentials, history,
//! transport failures) are queued as follow-up events and handled in order
//! before the next source is polled.

use std::{collections::VecDeque, time::Duration};

use parley_client::{Client, ClientAction, ClientEvent, MessageKey, SessionSnapshot, SyncConfig};
use parley_core::env::Environment;
use parley_proto::{ConversationId, UserId};
use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};

use crate::{
    CredentialResolver, RuntimeError,
    directory::ConversationDirectory,
    driver::GatewayDriver,
    timers::{TimerFirings, TimerSet},
};

/// Default housekeeping interval (remote typing expiry).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Default depth of the command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Sync engine settings
    pub sync: SyncConfig,
    /// How often to run housekeeping
    pub tick_interval: Duration,
    /// Commands buffered before [`RuntimeHandle::send`] waits
    pub command_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

/// User intents accepted by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to the gateway.
    Connect,
    /// Disconnect, keeping the session.
    Disconnect,
    /// Disconnect and discard the session.
    Logout,
    /// Send a message.
    SendMessage {
        /// Target conversation
        conversation_id: ConversationId,
        /// Message text
        content: String,
    },
    /// Retry a pending or failed message.
    RetryMessage {
        /// Owning conversation
        conversation_id: ConversationId,
        /// Message to retry
        key: MessageKey,
    },
    /// A keystroke in the composer.
    Keystroke {
        /// Conversation being typed in
        conversation_id: ConversationId,
    },
    /// Open or close a conversation.
    SetActiveConversation(Option<ConversationId>),
    /// Mark a conversation read.
    MarkRead {
        /// Conversation that was read
        conversation_id: ConversationId,
    },
    /// Load the next older page of a conversation's history.
    LoadOlderHistory {
        /// Conversation to page back through
        conversation_id: ConversationId,
    },
    /// Reload the conversation list from the directory.
    RefreshConversations,
    /// Start a conversation.
    CreateConversation {
        /// The other participant
        counterpart: UserId,
    },
    /// Stop the runtime.
    Shutdown,
}

/// Cloneable handle for talking to a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl RuntimeHandle {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands.send(command).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Subscribe to session snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Drives a [`Client`] against a gateway and its collaborators.
///
/// # Type Parameters
///
/// - `E`: Environment (clock)
/// - `D`: Gateway transport
/// - `C`: Conversation directory
/// - `R`: Credential resolver
pub struct Runtime<E, D, C, R>
where
    E: Environment,
    D: GatewayDriver,
    C: ConversationDirectory,
    R: CredentialResolver,
{
    env: E,
    client: Client<E>,
    driver: D,
    directory: C,
    credentials: R,
    timers: TimerSet<E>,
    firings: TimerFirings,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    tick_interval: Duration,
    /// Set between a successful open and the matching close. Tracked here
    /// rather than asked of the driver so a transport that dies between polls
    /// still gets its final `recv`.
    transport_open: bool,
}

impl<E, D, C, R> Runtime<E, D, C, R>
where
    E: Environment,
    D: GatewayDriver,
    C: ConversationDirectory,
    R: CredentialResolver,
{
    /// Create a runtime and its handle. Nothing happens until [`run`] is
    /// awaited.
    ///
    /// [`run`]: Self::run
    pub fn new(
        env: E,
        driver: D,
        directory: C,
        credentials: R,
        config: RuntimeConfig,
    ) -> (Self, RuntimeHandle) {
        let client = Client::new(env.clone(), config.sync);
        let (timers, firings) = TimerSet::new(env.clone());
        let (command_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let (snapshots, snapshot_rx) = watch::channel(client.snapshot());

        let runtime = Self {
            env,
            client,
            driver,
            directory,
            credentials,
            timers,
            firings,
            commands,
            snapshots,
            tick_interval: config.tick_interval,
            transport_open: false,
        };
        (runtime, RuntimeHandle { commands: command_tx, snapshots: snapshot_rx })
    }

    /// Run until [`Command::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("runtime started");

        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.command(command).await,
                },

                Some((slot, token)) = self.firings.recv() => {
                    Some(ClientEvent::TimerFired { slot, token })
                },

                frame = self.driver.recv(), if self.transport_open => match frame {
                    Some(frame) => Some(ClientEvent::FrameReceived(frame)),
                    None => {
                        self.close_transport().await;
                        Some(ClientEvent::TransportLost { reason: "transport closed".into() })
                    },
                },

                _ = tick.tick() => Some(ClientEvent::Tick { now: self.env.now() }),
            };

            if let Some(event) = event {
                self.dispatch(event).await;
            }
        }

        self.shutdown().await;
    }

    /// Feed one event and everything it leads to through the client.
    async fn dispatch(&mut self, event: ClientEvent<E::Instant>) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            for action in self.client.handle(event) {
                if let Some(follow_up) = self.execute(action).await {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, action: ClientAction) -> Option<ClientEvent<E::Instant>> {
        match action {
            ClientAction::ResolveCredentials => {
                Some(ClientEvent::CredentialsResolved(self.credentials.resolve().await))
            },
            ClientAction::OpenConnection { token } => {
                self.close_transport().await;
                match self.driver.open(&token).await {
                    Ok(()) => {
                        self.transport_open = true;
                        None
                    },
                    Err(err) => {
                        let err = RuntimeError::driver(err);
                        tracing::warn!(%err, "failed to open gateway connection");
                        Some(ClientEvent::TransportLost { reason: err.to_string() })
                    },
                }
            },
            ClientAction::CloseConnection => {
                self.close_transport().await;
                None
            },
            ClientAction::Emit(event) => {
                let name = event.name();
                let frame = match event.into_frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        let err = RuntimeError::from(err);
                        tracing::warn!(%err, event = name, "emission dropped");
                        return None;
                    },
                };
                match self.driver.send(frame).await {
                    Ok(()) => None,
                    Err(err) => {
                        let err = RuntimeError::driver(err);
                        tracing::warn!(%err, event = name, "emission failed");
                        Some(ClientEvent::TransportLost { reason: err.to_string() })
                    },
                }
            },
            ClientAction::StartTimer { slot, token, delay } => {
                self.timers.start(slot, token, delay);
                None
            },
            ClientAction::CancelTimer { slot } => {
                self.timers.cancel(slot);
                None
            },
            ClientAction::FetchHistory { conversation_id, page } => {
                match self.directory.fetch_history(conversation_id, page).await {
                    Ok(page) => Some(ClientEvent::HistoryLoaded { conversation_id, page }),
                    Err(err) => {
                        tracing::warn!(
                            err = %RuntimeError::directory(err),
                            conversation_id,
                            page,
                            "history fetch failed"
                        );
                        Some(ClientEvent::HistoryUnavailable { conversation_id })
                    },
                }
            },
            ClientAction::UpdateMessageStatus { message_id, status } => {
                if let Err(err) = self.directory.update_message_status(message_id, status).await {
                    tracing::warn!(
                        err = %RuntimeError::directory(err),
                        message_id,
                        %status,
                        "status update failed"
                    );
                }
                None
            },
            ClientAction::Publish => {
                self.snapshots.send_replace(self.client.snapshot());
                None
            },
        }
    }

    async fn command(&mut self, command: Command) -> Option<ClientEvent<E::Instant>> {
        let event = match command {
            Command::Connect => ClientEvent::Connect,
            Command::Disconnect => ClientEvent::Disconnect,
            Command::Logout => ClientEvent::Logout,
            Command::SendMessage { conversation_id, content } => {
                ClientEvent::SendMessage { conversation_id, content }
            },
            Command::RetryMessage { conversation_id, key } => {
                ClientEvent::RetryMessage { conversation_id, key }
            },
            Command::Keystroke { conversation_id } => ClientEvent::Keystroke { conversation_id },
            Command::SetActiveConversation(conversation_id) => {
                ClientEvent::SetActiveConversation(conversation_id)
            },
            Command::MarkRead { conversation_id } => ClientEvent::MarkRead { conversation_id },
            Command::LoadOlderHistory { conversation_id } => {
                ClientEvent::LoadOlderHistory { conversation_id }
            },
            Command::RefreshConversations => match self.directory.list_conversations().await {
                Ok(conversations) => ClientEvent::ConversationsLoaded(conversations),
                Err(err) => {
                    tracing::warn!(err = %RuntimeError::directory(err), "conversation list failed");
                    return None;
                },
            },
            Command::CreateConversation { counterpart } => {
                match self.directory.create_conversation(counterpart).await {
                    Ok(conversation) => ClientEvent::ConversationCreated(conversation),
                    Err(err) => {
                        tracing::warn!(
                            err = %RuntimeError::directory(err),
                            counterpart,
                            "conversation creation failed"
                        );
                        return None;
                    },
                }
            },
            Command::Shutdown => return None,
        };
        Some(event)
    }

    async fn close_transport(&mut self) {
        self.transport_open = false;
        if self.driver.is_open() {
            self.driver.close().await;
        }
    }

    async fn shutdown(&mut self) {
        self.timers.cancel_all();
        self.close_transport().await;
        tracing::info!("runtime stopped");
    }
}
