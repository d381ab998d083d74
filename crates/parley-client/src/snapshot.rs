//! Immutable session view for the UI.

use std::collections::{BTreeMap, BTreeSet};

use parley_core::{ConnectionState, Disconnection, Identity};
use parley_proto::ConversationId;

use crate::state::{Conversation, Message};

/// Everything a UI needs to render one frame.
///
/// Built between transitions, so it is never torn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Gateway connection state
    pub connection_state: ConnectionState,
    /// How and why the last connection ended, if it did
    pub last_disconnect: Option<Disconnection>,
    /// Local user, once credentials were resolved
    pub identity: Option<Identity>,
    /// Conversations, most recent activity first
    pub conversations: Vec<Conversation>,
    /// Conversation the user has open
    pub active_conversation: Option<ConversationId>,
    /// Cached messages per conversation, oldest first
    pub messages_by_conversation: BTreeMap<ConversationId, Vec<Message>>,
    /// Conversations with older history pages left to load
    pub older_history: BTreeSet<ConversationId>,
    /// Usernames currently typing, per conversation
    pub typing_by_conversation: BTreeMap<ConversationId, Vec<String>>,
}

impl SessionSnapshot {
    /// Messages of one conversation.
    pub fn messages(&self, conversation_id: ConversationId) -> &[Message] {
        self.messages_by_conversation.get(&conversation_id).map_or(&[], Vec::as_slice)
    }

    /// Usernames typing in one conversation.
    pub fn typing(&self, conversation_id: ConversationId) -> &[String] {
        self.typing_by_conversation.get(&conversation_id).map_or(&[], Vec::as_slice)
    }

    /// Look up a conversation.
    pub fn conversation(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }
}
