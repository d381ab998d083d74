//! Client error types.
//!
//! Errors never escape [`crate::Client::handle`]: they are logged there and
//! the session state is left as it was. Failures the user needs to see are
//! expressed through message status instead.

use parley_core::{ConnectionError, DisconnectKind};
use parley_proto::{ConversationId, ProtocolError};
use thiserror::Error;

use crate::state::MessageKey;

/// Errors from the sync state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No usable credentials; the connect was aborted.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(ConnectionError),

    /// Connection event that does not fit the current state.
    #[error("connection: {0}")]
    Connection(ConnectionError),

    /// Transport dropped; handed to the reconnection policy.
    #[error("transient disconnect: {reason}")]
    TransientDisconnect {
        /// Reason reported by the transport
        reason: String,
    },

    /// Gateway ended the session; no automatic reconnect.
    #[error("terminal disconnect: {reason}")]
    TerminalDisconnect {
        /// Reason reported by the gateway
        reason: String,
    },

    /// Gateway frame could not be decoded; it was dropped.
    #[error("malformed gateway event: {0}")]
    MalformedEvent(#[from] ProtocolError),

    /// Message could not be (re)sent.
    #[error("send failed for {key:?} in conversation {conversation_id}: {reason}")]
    SendFailure {
        /// Owning conversation
        conversation_id: ConversationId,
        /// Message that failed
        key: MessageKey,
        /// What went wrong
        reason: String,
    },

    /// Command referenced a message that is not cached.
    #[error("unknown message {key:?} in conversation {conversation_id}")]
    UnknownMessage {
        /// Conversation searched
        conversation_id: ConversationId,
        /// Message looked up
        key: MessageKey,
    },

    /// Command referenced a conversation that is not loaded.
    #[error("unknown conversation {0}")]
    UnknownConversation(ConversationId),

    /// Operation needs a local identity, but no credentials were ever
    /// resolved.
    #[error("no local identity")]
    NoIdentity,
}

impl ClientError {
    /// Classified disconnect as an error, for logging.
    pub fn disconnect(kind: DisconnectKind, reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        match kind {
            DisconnectKind::Transient => Some(Self::TransientDisconnect { reason }),
            DisconnectKind::Terminal => Some(Self::TerminalDisconnect { reason }),
            DisconnectKind::Local => None,
        }
    }
}

impl From<ConnectionError> for ClientError {
    fn from(err: ConnectionError) -> Self {
        if err.is_unavailable() { Self::ConnectionUnavailable(err) } else { Self::Connection(err) }
    }
}
