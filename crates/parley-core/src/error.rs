//! Error types for the Parley connection core.
//!
//! Connection errors are never fatal to the session: the caller logs them and
//! the connection stays (or becomes) disconnected.

use parley_proto::DisconnectReason;
use thiserror::Error;

use crate::connection::ConnectionState;

/// How a disconnect should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectKind {
    /// The gateway ended the session. Never auto-reconnect.
    Terminal,
    /// The user asked to disconnect.
    Local,
    /// Anything the user did not ask for: network loss, failed open, a
    /// transport-reported client disconnect. Eligible for backoff.
    Transient,
}

impl From<&DisconnectReason> for DisconnectKind {
    fn from(reason: &DisconnectReason) -> Self {
        match reason {
            DisconnectReason::ServerInitiated => Self::Terminal,
            // The runtime stops reading once it closes the transport itself,
            // so this frame only arrives for teardowns it did not request.
            DisconnectReason::ClientInitiated | DisconnectReason::Transport(_) => Self::Transient,
        }
    }
}

/// How and why the last connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Disconnection {
    /// Classification
    pub kind: DisconnectKind,
    /// Reason as reported by the gateway or transport
    pub reason: String,
}

impl Disconnection {
    /// Create a disconnection record.
    pub fn new(kind: DisconnectKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

/// Errors raised by the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Credential resolver returned nothing.
    #[error("no credentials available")]
    MissingCredentials,

    /// Credential resolver returned an empty token.
    #[error("credential token is empty")]
    EmptyToken,

    /// Operation not valid in the current state.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

impl ConnectionError {
    /// True if the failure means "no usable credentials", which aborts a
    /// connect silently.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::MissingCredentials | Self::EmptyToken)
    }
}
