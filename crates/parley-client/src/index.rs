//! Conversation list ordered by recent activity.
//!
//! # Invariants
//!
//! - Conversation ids are unique.
//! - After a sort, the list is descending by [`Conversation::activity_at`];
//!   ties keep their previous relative order.

use chrono::{DateTime, Utc};
use parley_proto::{ConversationId, UserId};

use crate::state::Conversation;

/// Ordered conversation list with unread accounting.
#[derive(Debug, Clone, Default)]
pub struct ConversationIndex {
    conversations: Vec<Conversation>,
}

impl ConversationIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list, dropping duplicate ids (first wins) and
    /// sorting.
    pub fn load(&mut self, conversations: Vec<Conversation>) {
        self.conversations.clear();
        for conversation in conversations {
            if self.get(conversation.id).is_some() {
                tracing::debug!(
                    conversation_id = conversation.id,
                    "duplicate conversation dropped"
                );
                continue;
            }
            self.conversations.push(conversation);
        }
        self.sort();
    }

    /// Put a newly created conversation at the top without re-sorting.
    ///
    /// An existing entry with the same id is replaced.
    pub fn prepend(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }

    /// Record a newly applied confirmed message.
    ///
    /// Returns `false` if the conversation is not loaded.
    pub fn record_message(
        &mut self,
        conversation_id: ConversationId,
        sent_at: DateTime<Utc>,
        sender_id: UserId,
        local_user: Option<UserId>,
    ) -> bool {
        let Some(conversation) = self.get_mut(conversation_id) else {
            return false;
        };

        conversation.last_message_at =
            Some(conversation.last_message_at.map_or(sent_at, |t| t.max(sent_at)));
        if Some(sender_id) != local_user {
            conversation.unread_count = conversation.unread_count.saturating_add(1);
        }

        self.sort();
        true
    }

    /// Zero the unread count. Returns the previous count, or `None` if the
    /// conversation is not loaded.
    pub fn mark_read(&mut self, conversation_id: ConversationId) -> Option<u32> {
        self.get_mut(conversation_id).map(|c| std::mem::take(&mut c.unread_count))
    }

    /// Look up a conversation.
    pub fn get(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    fn get_mut(&mut self, conversation_id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == conversation_id)
    }

    /// Conversations in display order.
    pub fn as_slice(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// True if no conversations are loaded.
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Forget every conversation.
    pub fn clear(&mut self) {
        self.conversations.clear();
    }

    fn sort(&mut self) {
        // sort_by is stable, so ties keep prior order
        self.conversations.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
    }
}
