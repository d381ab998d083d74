//! Message reconciliation.
//!
//! Merges optimistic local sends with gateway confirmations and inbound
//! messages into one list per conversation.
//!
//! # Invariants
//!
//! - At most one entry per confirmed id per conversation.
//! - At most one unconfirmed entry per `client_temp_id`.
//! - A confirmation replaces its optimistic entry at the same index.
//! - Each list holds at most `limit` entries; the oldest are evicted first.
//! - A confirmed message at or behind the eviction horizon that is no longer
//!   cached is never re-added, so a late replay cannot be counted twice.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parley_proto::{ConversationId, MessageId, MessageStatus, NewMessage, UserId};

use crate::state::{HistoryPage, Message, MessageKey};

/// Outcome of applying a confirmed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New entry at the end of the list
    Appended,
    /// Optimistic entry at `index` promoted in place
    Replaced {
        /// Position of the promoted entry
        index: usize,
    },
    /// Confirmed id was already cached, so the optimistic entry was dropped
    Superseded,
    /// Already cached; nothing changed
    Duplicate,
    /// Older than everything evicted so far; dropped
    Stale,
}

impl Applied {
    /// True if this message was not seen before.
    pub fn is_new(self) -> bool {
        matches!(self, Self::Appended | Self::Replaced { .. })
    }
}

/// Newest evicted confirmed message as `(created_at, id)`.
type Horizon = (DateTime<Utc>, MessageId);

#[derive(Debug, Clone, Copy, Default)]
struct HistoryCursor {
    pages_loaded: u32,
    has_more: bool,
    fetching: bool,
}

#[derive(Debug, Clone, Default)]
struct Thread {
    messages: Vec<Message>,
    horizon: Option<Horizon>,
    history: HistoryCursor,
}

impl Thread {
    fn behind_horizon(&self, message: &Message) -> bool {
        self.horizon.is_some_and(|horizon| (message.created_at, message.id) <= horizon)
    }

    fn enforce_cap(&mut self, limit: usize) {
        if self.messages.len() <= limit {
            return;
        }
        let excess = self.messages.len() - limit;
        for evicted in self.messages.drain(..excess) {
            if evicted.is_confirmed() {
                let key = (evicted.created_at, evicted.id);
                self.horizon = Some(self.horizon.map_or(key, |horizon| horizon.max(key)));
            }
        }
        tracing::trace!(evicted = excess, "message cache over limit");
    }
}

/// Per-conversation sliding message cache.
#[derive(Debug, Clone)]
pub struct MessageCache {
    threads: HashMap<ConversationId, Thread>,
    next_temp: u64,
    limit: usize,
}

impl MessageCache {
    /// Create an empty cache keeping `limit` messages per conversation.
    pub fn new(limit: usize) -> Self {
        Self { threads: HashMap::new(), next_temp: 0, limit }
    }

    /// Next correlation id (`temp_1`, `temp_2`, ...).
    ///
    /// The sequence survives [`MessageCache::clear`], so ids never repeat
    /// within a process.
    pub fn next_temp_id(&mut self) -> String {
        self.next_temp += 1;
        format!("temp_{}", self.next_temp)
    }

    /// Append an optimistic message.
    pub fn push_optimistic(&mut self, message: Message) {
        let limit = self.limit;
        let thread = self.threads.entry(message.conversation_id).or_default();
        thread.messages.push(message);
        thread.enforce_cap(limit);
    }

    /// Apply a confirmed message from the gateway.
    ///
    /// `local_user` decides the status upgrade: a `sent` message from anyone
    /// else has, by definition, been delivered to us.
    pub fn apply_confirmed(&mut self, payload: &NewMessage, local_user: Option<UserId>) -> Applied {
        let Some(mut incoming) = Message::confirmed(payload) else {
            return Applied::Duplicate;
        };
        if Some(incoming.sender_id) != local_user && incoming.status == MessageStatus::Sent {
            incoming.status = MessageStatus::Delivered;
        }

        let limit = self.limit;
        let thread = self.threads.entry(incoming.conversation_id).or_default();
        let stale = thread.behind_horizon(&incoming);
        let messages = &mut thread.messages;
        let id_known = messages.iter().any(|m| m.id == incoming.id);

        if let Some(temp) = incoming.client_temp_id.as_deref()
            && let Some(index) = messages
                .iter()
                .position(|m| !m.is_confirmed() && m.client_temp_id.as_deref() == Some(temp))
        {
            if id_known {
                messages.remove(index);
                return Applied::Superseded;
            }

            incoming.retry_count = messages[index].retry_count;
            messages[index] = incoming;
            return Applied::Replaced { index };
        }

        if id_known {
            return Applied::Duplicate;
        }
        if let Some(temp) = incoming.client_temp_id.as_deref()
            && messages.iter().any(|m| m.client_temp_id.as_deref() == Some(temp))
        {
            return Applied::Duplicate;
        }
        if stale {
            tracing::debug!(
                conversation_id = incoming.conversation_id,
                message_id = incoming.id,
                "message already evicted"
            );
            return Applied::Stale;
        }

        messages.push(incoming);
        thread.enforce_cap(limit);
        Applied::Appended
    }

    /// Merge a page of history.
    ///
    /// Known ids and entries behind the eviction horizon are skipped, pending
    /// optimistic entries with a matching correlation id are promoted, the
    /// list is re-ordered by time, then capped.
    pub fn merge_history(&mut self, conversation_id: ConversationId, page: HistoryPage) {
        let limit = self.limit;
        let thread = self.threads.entry(conversation_id).or_default();
        thread.history = HistoryCursor {
            pages_loaded: thread.history.pages_loaded + 1,
            has_more: page.has_next,
            fetching: false,
        };

        for incoming in page.messages {
            if !incoming.is_confirmed() || incoming.conversation_id != conversation_id {
                tracing::debug!(
                    conversation_id,
                    message_id = incoming.id,
                    "skipping history entry that does not belong here"
                );
                continue;
            }
            if thread.behind_horizon(&incoming)
                || thread.messages.iter().any(|m| m.id == incoming.id)
            {
                continue;
            }

            let pending = incoming.client_temp_id.as_deref().and_then(|temp| {
                thread
                    .messages
                    .iter()
                    .position(|m| !m.is_confirmed() && m.client_temp_id.as_deref() == Some(temp))
            });
            match pending {
                Some(index) => thread.messages[index] = incoming,
                None => thread.messages.push(incoming),
            }
        }

        thread.messages.sort_by_key(|m| m.created_at);
        thread.enforce_cap(limit);
    }

    /// Claim the first history page of a conversation. `None` once it was
    /// loaded or while it is in flight.
    pub fn start_history(&mut self, conversation_id: ConversationId) -> Option<u32> {
        let cursor = &mut self.threads.entry(conversation_id).or_default().history;
        if cursor.pages_loaded > 0 || cursor.fetching {
            return None;
        }
        cursor.fetching = true;
        Some(1)
    }

    /// Claim the next older history page, starting with the first.
    pub fn continue_history(&mut self, conversation_id: ConversationId) -> Option<u32> {
        if self.threads.get(&conversation_id).is_none_or(|t| t.history.pages_loaded == 0) {
            return self.start_history(conversation_id);
        }
        if !self.has_more(conversation_id) {
            return None;
        }

        let cursor = &mut self.threads.entry(conversation_id).or_default().history;
        if cursor.fetching {
            return None;
        }
        cursor.fetching = true;
        Some(cursor.pages_loaded + 1)
    }

    /// A claimed page could not be loaded; it may be claimed again.
    pub fn history_failed(&mut self, conversation_id: ConversationId) {
        if let Some(thread) = self.threads.get_mut(&conversation_id) {
            thread.history.fetching = false;
        }
    }

    /// Messages of a conversation, oldest first.
    pub fn messages(&self, conversation_id: ConversationId) -> &[Message] {
        self.threads.get(&conversation_id).map_or(&[], |t| t.messages.as_slice())
    }

    /// True if the directory reported older pages and the window still has
    /// room for them. A full window would evict them on arrival.
    pub fn has_more(&self, conversation_id: ConversationId) -> bool {
        self.threads
            .get(&conversation_id)
            .is_some_and(|t| t.history.has_more && t.messages.len() < self.limit)
    }

    /// Look up a message.
    pub fn get(&self, conversation_id: ConversationId, key: &MessageKey) -> Option<&Message> {
        self.messages(conversation_id).iter().find(|m| m.matches(key))
    }

    /// Look up a message for mutation.
    pub fn get_mut(
        &mut self,
        conversation_id: ConversationId,
        key: &MessageKey,
    ) -> Option<&mut Message> {
        self.threads.get_mut(&conversation_id)?.messages.iter_mut().find(|m| m.matches(key))
    }

    /// Newest confirmed message from someone other than `local_user` that is
    /// not yet marked read.
    pub fn latest_unread_inbound(
        &mut self,
        conversation_id: ConversationId,
        local_user: UserId,
    ) -> Option<&mut Message> {
        self.threads.get_mut(&conversation_id)?.messages.iter_mut().rev().find(|m| {
            m.is_confirmed() && m.sender_id != local_user && m.status != MessageStatus::Read
        })
    }

    /// Every cached conversation with its messages.
    pub fn iter(&self) -> impl Iterator<Item = (ConversationId, &[Message])> {
        self.threads.iter().map(|(id, t)| (*id, t.messages.as_slice()))
    }

    /// Drop every cached message and history cursor. The correlation id
    /// sequence is kept.
    pub fn clear(&mut self) {
        self.threads.clear();
    }
}
