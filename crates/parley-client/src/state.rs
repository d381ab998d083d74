//! Observable session entities.
//!
//! These are the view-model types the UI renders. They hold plain data only;
//! every mutation goes through [`crate::Client::handle`].

use chrono::{DateTime, Utc};
use parley_proto::{ConversationId, MessageId, MessageStatus, NewMessage, UserId};

/// A two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Conversation id
    pub id: ConversationId,
    /// First participant
    pub participant_a: UserId,
    /// Second participant
    pub participant_b: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the newest confirmed message, if any
    pub last_message_at: Option<DateTime<Utc>>,
    /// Inbound messages not yet read
    pub unread_count: u32,
}

impl Conversation {
    /// Create a conversation with no messages.
    pub fn new(
        id: ConversationId,
        participant_a: UserId,
        participant_b: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            participant_a,
            participant_b,
            created_at,
            last_message_at: None,
            unread_count: 0,
        }
    }

    /// Sort key: the newer of `last_message_at` and `created_at`.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message_at.map_or(self.created_at, |t| t.max(self.created_at))
    }

    /// The participant that is not `user`.
    pub fn counterpart(&self, user: UserId) -> UserId {
        if self.participant_a == user { self.participant_b } else { self.participant_a }
    }
}

/// A cached message.
///
/// `id` is `0` until the gateway confirms the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server id, `0` while unconfirmed
    pub id: MessageId,
    /// Correlation id assigned on optimistic send
    pub client_temp_id: Option<String>,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Author
    pub sender_id: UserId,
    /// Text
    pub content: String,
    /// Delivery status
    pub status: MessageStatus,
    /// Server time once confirmed, local wall-clock time before that
    pub created_at: DateTime<Utc>,
    /// Explicit retries so far
    pub retry_count: u32,
}

impl Message {
    /// Optimistic local message in `sending` state.
    pub fn optimistic(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
        temp_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            client_temp_id: Some(temp_id.into()),
            conversation_id,
            sender_id,
            content: content.into(),
            status: MessageStatus::Sending,
            created_at,
            retry_count: 0,
        }
    }

    /// Message built from a confirmed gateway payload.
    ///
    /// Returns `None` if the payload carries no usable id.
    pub fn confirmed(payload: &NewMessage) -> Option<Self> {
        Some(Self {
            id: payload.confirmed_id()?,
            client_temp_id: payload.temp_id().map(str::to_owned),
            conversation_id: payload.conversation_id,
            sender_id: payload.sender_id,
            content: payload.content.clone(),
            status: payload.status,
            created_at: payload.created_at,
            retry_count: 0,
        })
    }

    /// True once the gateway assigned an id.
    pub fn is_confirmed(&self) -> bool {
        self.id != 0
    }

    /// True if the message matches `key`.
    pub fn matches(&self, key: &MessageKey) -> bool {
        match key {
            MessageKey::Id(id) => *id != 0 && self.id == *id,
            MessageKey::Temp(temp) => self.client_temp_id.as_deref() == Some(temp.as_str()),
        }
    }

    /// True if another explicit retry is allowed.
    ///
    /// Only messages still `sending` or `failed` are retryable.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        matches!(self.status, MessageStatus::Sending | MessageStatus::Failed)
            && self.retry_count < max_retries
    }
}

/// How a command refers to a cached message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// Server-assigned id
    Id(MessageId),
    /// Client correlation id
    Temp(String),
}

/// One page of conversation history from the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPage {
    /// Confirmed messages, in any order
    pub messages: Vec<Message>,
    /// True if older pages exist
    pub has_next: bool,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[test]
    fn activity_prefers_newer_timestamp() {
        let mut conv = Conversation::new(1, 7, 9, at(100));
        assert_eq!(conv.activity_at(), at(100));

        conv.last_message_at = Some(at(200));
        assert_eq!(conv.activity_at(), at(200));

        conv.last_message_at = Some(at(50));
        assert_eq!(conv.activity_at(), at(100));
    }

    #[test]
    fn counterpart() {
        let conv = Conversation::new(1, 7, 9, at(0));
        assert_eq!(conv.counterpart(7), 9);
        assert_eq!(conv.counterpart(9), 7);
    }

    #[test]
    fn retry_allowed_only_for_pending_or_failed() {
        let mut msg = Message::optimistic(1, 7, "hi", "temp_1", at(0));
        assert!(msg.can_retry(3));

        msg.retry_count = 3;
        assert!(!msg.can_retry(3));

        msg.retry_count = 0;
        msg.status = MessageStatus::Delivered;
        assert!(!msg.can_retry(3));
    }

    #[test]
    fn id_key_never_matches_unconfirmed() {
        let msg = Message::optimistic(1, 7, "hi", "temp_1", at(0));
        assert!(!msg.matches(&MessageKey::Id(0)));
        assert!(msg.matches(&MessageKey::Temp("temp_1".into())));
    }
}
