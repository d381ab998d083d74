//! Session invariants.

use std::collections::HashSet;

use parley_client::SessionSnapshot;
use parley_proto::MessageStatus;

use super::{Invariant, InvariantResult, Violation};

/// Conversations are ordered by activity, newest first.
pub struct ConversationsSorted;

impl Invariant for ConversationsSorted {
    fn name(&self) -> &'static str {
        "conversations_sorted"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        for pair in state.conversations.windows(2) {
            if pair[0].activity_at() < pair[1].activity_at() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "conversation {} ({}) listed before {} ({})",
                        pair[0].id,
                        pair[0].activity_at(),
                        pair[1].id,
                        pair[1].activity_at()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// No conversation id appears twice.
pub struct UniqueConversations;

impl Invariant for UniqueConversations {
    fn name(&self) -> &'static str {
        "unique_conversations"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for conversation in &state.conversations {
            if !seen.insert(conversation.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("conversation {} listed twice", conversation.id),
                });
            }
        }
        Ok(())
    }
}

/// Per conversation: one entry per confirmed id, one per pending correlation
/// id, and every entry filed under its own conversation.
///
/// Unconfirmed entries are always local sends, so they carry a correlation id
/// and are either still sending or failed.
pub struct MessageIdentity;

impl Invariant for MessageIdentity {
    fn name(&self) -> &'static str {
        "message_identity"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let violation = |message: String| Err(Violation { invariant: self.name(), message });

        for (conversation_id, messages) in &state.messages_by_conversation {
            let mut ids = HashSet::new();
            let mut pending = HashSet::new();

            for message in messages {
                if message.conversation_id != *conversation_id {
                    return violation(format!(
                        "message {} of conversation {} filed under {}",
                        message.id, message.conversation_id, conversation_id
                    ));
                }

                if message.is_confirmed() {
                    if !ids.insert(message.id) {
                        return violation(format!(
                            "conversation {conversation_id}: id {} cached twice",
                            message.id
                        ));
                    }
                    continue;
                }

                let Some(temp_id) = message.client_temp_id.as_deref() else {
                    return violation(format!(
                        "conversation {conversation_id}: unconfirmed message without temp id"
                    ));
                };
                if !matches!(message.status, MessageStatus::Sending | MessageStatus::Failed) {
                    return violation(format!(
                        "conversation {conversation_id}: pending {temp_id} has status {}",
                        message.status
                    ));
                }
                if !pending.insert(temp_id) {
                    return violation(format!(
                        "conversation {conversation_id}: temp id {temp_id} pending twice"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// No conversation caches more than `limit` messages.
pub struct CacheBounded {
    /// Configured per-conversation limit
    pub limit: usize,
}

impl Invariant for CacheBounded {
    fn name(&self) -> &'static str {
        "cache_bounded"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        for (conversation_id, messages) in &state.messages_by_conversation {
            if messages.len() > self.limit {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "conversation {conversation_id} caches {} messages, limit {}",
                        messages.len(),
                        self.limit
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Typing sets are non-empty and hold each username once.
pub struct TypingSetsWellFormed;

impl Invariant for TypingSetsWellFormed {
    fn name(&self) -> &'static str {
        "typing_sets_well_formed"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        for (conversation_id, usernames) in &state.typing_by_conversation {
            if usernames.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("conversation {conversation_id} has an empty typing set"),
                });
            }
            let unique: HashSet<_> = usernames.iter().collect();
            if unique.len() != usernames.len() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "conversation {conversation_id} lists a typist twice: {usernames:?}"
                    ),
                });
            }
        }
        Ok(())
    }
}
