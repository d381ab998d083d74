//! Typing presence payloads.
//!
//! Presence is ephemeral: the gateway never persists it and the client only
//! keeps it for a few seconds.

use serde::{Deserialize, Serialize};

use super::{ConversationId, UserId};

/// Inbound `user_typing` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTyping {
    /// Conversation the user is typing in
    pub conversation_id: ConversationId,
    /// Typing user's id
    pub user_id: UserId,
    /// Typing user's display name
    pub username: String,
    /// Whether the user started or stopped typing
    pub is_typing: bool,
}

/// Outbound `typing` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    /// Conversation the local user is typing in
    pub conversation_id: ConversationId,
    /// Whether the local user started or stopped typing
    pub is_typing: bool,
}
