//! Session lifecycle payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ConversationId;

/// Inbound `disconnect` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Disconnect {
    /// Free-form reason reported by the transport
    #[serde(default)]
    pub reason: String,
}

impl Disconnect {
    /// Reason string the gateway uses when it drops the client on purpose.
    pub const SERVER_INITIATED: &'static str = "io server disconnect";

    /// Reason string reported when the client closed the connection itself.
    pub const CLIENT_INITIATED: &'static str = "io client disconnect";

    /// Create a disconnect payload with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// Classify the reason string.
    pub fn classify(&self) -> DisconnectReason {
        match self.reason.as_str() {
            Self::SERVER_INITIATED => DisconnectReason::ServerInitiated,
            Self::CLIENT_INITIATED => DisconnectReason::ClientInitiated,
            other => DisconnectReason::Transport(other.to_string()),
        }
    }
}

/// Who ended a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The gateway closed the session deliberately.
    ServerInitiated,
    /// The local client closed the session.
    ClientInitiated,
    /// Anything else: network loss, ping timeout, transport error.
    Transport(String),
}

/// Inbound `connected` acknowledgement.
///
/// The ack body is opaque to the client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectedAck {
    /// Opaque acknowledgement value
    #[serde(default)]
    pub ack: Value,
}

/// Outbound `join_conversation` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConversation {
    /// Conversation to subscribe to
    pub conversation_id: ConversationId,
}

/// Inbound `error` payload.
///
/// The gateway sends arbitrary objects here, often empty. Empty errors carry
/// no information and are ignored by the client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorPayload(pub Map<String, Value>);

impl ErrorPayload {
    /// True if the error object has no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable message, if the gateway supplied one.
    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_disconnect_reasons() {
        assert_eq!(
            Disconnect::new("io server disconnect").classify(),
            DisconnectReason::ServerInitiated
        );
        assert_eq!(
            Disconnect::new("io client disconnect").classify(),
            DisconnectReason::ClientInitiated
        );
        assert_eq!(
            Disconnect::new("ping timeout").classify(),
            DisconnectReason::Transport("ping timeout".into())
        );
        assert_eq!(Disconnect::default().classify(), DisconnectReason::Transport(String::new()));
    }

    #[test]
    fn error_payload_message() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"message":"rate limited","code":429}"#).unwrap();
        assert!(!payload.is_empty());
        assert_eq!(payload.message(), Some("rate limited"));

        let empty: ErrorPayload = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
