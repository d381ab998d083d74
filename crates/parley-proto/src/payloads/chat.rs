//! Chat message payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, MessageId, UserId};

/// Delivery status of a message.
///
/// `Sending` only ever exists locally; the gateway reports one of the other
/// four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Optimistic, not yet confirmed by the gateway
    Sending,
    /// Accepted by the gateway
    Sent,
    /// Delivered to the recipient
    Delivered,
    /// Read by the recipient
    Read,
    /// Rejected by the gateway or abandoned after retries
    Failed,
}

impl MessageStatus {
    /// Wire name of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound `new_message` payload.
///
/// The gateway sends the message id as `id` and, on some paths, repeats it as
/// `message_id`. Use [`NewMessage::confirmed_id`] rather than reading either
/// field directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Alternate spelling of the message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Author
    pub sender_id: UserId,
    /// Message text
    pub content: String,
    /// Server-reported status
    pub status: MessageStatus,
    /// Server timestamp (RFC 3339)
    pub created_at: DateTime<Utc>,
    /// Correlation id echoed from the sender's `send_message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
}

impl NewMessage {
    /// Server-assigned id, preferring `id` over `message_id`. `None` if
    /// neither is present or the id is zero.
    pub fn confirmed_id(&self) -> Option<MessageId> {
        self.id.or(self.message_id).filter(|id| *id != 0)
    }

    /// Correlation id, treating an empty string as absent.
    pub fn temp_id(&self) -> Option<&str> {
        self.temp_id.as_deref().filter(|t| !t.is_empty())
    }
}

/// Outbound `send_message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Target conversation
    pub conversation_id: ConversationId,
    /// Message text
    pub content: String,
    /// Client-generated correlation id
    pub temp_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: Option<u64>, message_id: Option<u64>) -> NewMessage {
        NewMessage {
            id,
            message_id,
            conversation_id: 1,
            sender_id: 2,
            content: "hi".into(),
            status: MessageStatus::Sent,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            temp_id: None,
        }
    }

    #[test]
    fn confirmed_id_prefers_id() {
        assert_eq!(message(Some(5), Some(6)).confirmed_id(), Some(5));
        assert_eq!(message(None, Some(6)).confirmed_id(), Some(6));
        assert_eq!(message(None, None).confirmed_id(), None);
        assert_eq!(message(Some(0), None).confirmed_id(), None);
    }

    #[test]
    fn empty_temp_id_is_absent() {
        let mut msg = message(Some(1), None);
        msg.temp_id = Some(String::new());
        assert_eq!(msg.temp_id(), None);

        msg.temp_id = Some("temp_3".into());
        assert_eq!(msg.temp_id(), Some("temp_3"));
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&MessageStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
        let parsed: MessageStatus = serde_json::from_str("\"read\"").unwrap();
        assert_eq!(parsed, MessageStatus::Read);
        assert!(serde_json::from_str::<MessageStatus>("\"bogus\"").is_err());
    }
}
