//! Client events and actions.

use std::time::Duration;

use parley_core::{Credentials, TimerSlot, TimerToken};
use parley_proto::{ConversationId, GatewayFrame, MessageId, MessageStatus, OutboundEvent};

use crate::state::{Conversation, HistoryPage, MessageKey};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Forwarding user intents (connect, send, typing, navigation)
/// - Delivering gateway frames and transport failures
/// - Reporting results of the collaborator calls it was asked to make
/// - Delivering timer firings and periodic ticks
///
/// Generic over `I` (Instant type) so tests can drive virtual time.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// User asked to connect.
    Connect,

    /// User asked to disconnect. The session state is kept.
    Disconnect,

    /// User logged out. All session state is discarded.
    Logout,

    /// Credential resolver finished.
    CredentialsResolved(Option<Credentials>),

    /// Frame received from the gateway.
    FrameReceived(GatewayFrame),

    /// Transport failed to open or vanished without a `disconnect` event.
    TransportLost {
        /// Driver-reported cause.
        reason: String,
    },

    /// User sends a message.
    SendMessage {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Message text.
        content: String,
    },

    /// User retries a pending or failed message.
    RetryMessage {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// Message to retry.
        key: MessageKey,
    },

    /// User typed in the composer.
    Keystroke {
        /// Conversation being typed in.
        conversation_id: ConversationId,
    },

    /// User opened (or closed, with `None`) a conversation.
    SetActiveConversation(Option<ConversationId>),

    /// Subscribe to a conversation without opening it.
    JoinConversation {
        /// Conversation to join.
        conversation_id: ConversationId,
    },

    /// User read a conversation.
    MarkRead {
        /// Conversation that was read.
        conversation_id: ConversationId,
    },

    /// Directory returned the conversation list.
    ConversationsLoaded(Vec<Conversation>),

    /// User asked for the next older page of a conversation's history.
    LoadOlderHistory {
        /// Conversation to page back through.
        conversation_id: ConversationId,
    },

    /// Directory returned a page of history.
    HistoryLoaded {
        /// Conversation the page belongs to.
        conversation_id: ConversationId,
        /// The page.
        page: HistoryPage,
    },

    /// Directory failed to return a requested page of history.
    HistoryUnavailable {
        /// Conversation the page was requested for.
        conversation_id: ConversationId,
    },

    /// Directory created a conversation.
    ConversationCreated(Conversation),

    /// A timer armed by [`ClientAction::StartTimer`] fired.
    TimerFired {
        /// Slot that fired.
        slot: TimerSlot,
        /// Token it was armed with.
        token: TimerToken,
    },

    /// Periodic housekeeping.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Ask the credential resolver; report back with
    /// [`ClientEvent::CredentialsResolved`].
    ResolveCredentials,

    /// Open the gateway transport.
    OpenConnection {
        /// Bearer token.
        token: String,
    },

    /// Close the gateway transport.
    CloseConnection,

    /// Send this emission to the gateway.
    Emit(OutboundEvent),

    /// Arm a timer, replacing any timer already armed in `slot`.
    StartTimer {
        /// Slot to arm.
        slot: TimerSlot,
        /// Token to report back in [`ClientEvent::TimerFired`].
        token: TimerToken,
        /// Delay before firing.
        delay: Duration,
    },

    /// Cancel the timer in `slot`.
    CancelTimer {
        /// Slot to cancel.
        slot: TimerSlot,
    },

    /// Ask the directory for a page of history; report back with
    /// [`ClientEvent::HistoryLoaded`] or [`ClientEvent::HistoryUnavailable`].
    FetchHistory {
        /// Conversation to load.
        conversation_id: ConversationId,
        /// One-based page number.
        page: u32,
    },

    /// Persist a status change through the directory.
    UpdateMessageStatus {
        /// Confirmed message id.
        message_id: MessageId,
        /// New status.
        status: MessageStatus,
    },

    /// Observable state changed; publish a new snapshot.
    Publish,
}
