//! In-memory conversation directory.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parley_app::ConversationDirectory;
use parley_client::{Conversation, HistoryPage, Message};
use parley_proto::{ConversationId, MessageId, MessageStatus, UserId};
use thiserror::Error;

/// Messages per history page.
pub const HISTORY_PAGE_SIZE: usize = 20;

/// Errors returned by [`SimDirectory`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimDirectoryError {
    /// Failure injected by the test.
    #[error("directory unavailable")]
    Unavailable,

    /// History requested for a conversation that does not exist.
    #[error("unknown conversation {0}")]
    UnknownConversation(ConversationId),
}

#[derive(Debug)]
struct DirectoryState {
    local_user: UserId,
    conversations: Vec<Conversation>,
    history: HashMap<ConversationId, Vec<Message>>,
    status_updates: Vec<(MessageId, MessageStatus)>,
    history_requests: Vec<(ConversationId, u32)>,
    next_conversation_id: ConversationId,
    clock: DateTime<Utc>,
    unavailable: bool,
}

/// Directory backed by memory. Clones share state.
#[derive(Debug, Clone)]
pub struct SimDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl SimDirectory {
    /// Empty directory for `local_user`.
    pub fn new(local_user: UserId) -> Self {
        let state = DirectoryState {
            local_user,
            conversations: Vec::new(),
            history: HashMap::new(),
            status_updates: Vec::new(),
            history_requests: Vec::new(),
            next_conversation_id: 1,
            clock: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).single().unwrap_or_default(),
            unavailable: false,
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a conversation with `counterpart` holding `history` (oldest
    /// first). Returns its id.
    pub fn seed(&self, counterpart: UserId, history: &[&str]) -> ConversationId {
        let mut state = self.lock();
        let mut conversation = state.new_conversation(counterpart);
        let id = conversation.id;

        let messages: Vec<_> = history
            .iter()
            .enumerate()
            .map(|(i, content)| {
                state.clock += TimeDelta::seconds(1);
                let sender = if i % 2 == 0 { counterpart } else { state.local_user };
                Message {
                    id: id * 10_000 + i as u64 + 1,
                    client_temp_id: None,
                    conversation_id: id,
                    sender_id: sender,
                    content: (*content).to_owned(),
                    status: MessageStatus::Read,
                    created_at: state.clock,
                    retry_count: 0,
                }
            })
            .collect();

        conversation.last_message_at = messages.last().map(|m| m.created_at);
        state.conversations.push(conversation);
        state.history.insert(id, messages);
        id
    }

    /// Fail every call until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Status updates received so far.
    pub fn status_updates(&self) -> Vec<(MessageId, MessageStatus)> {
        self.lock().status_updates.clone()
    }

    /// History pages requested so far.
    pub fn history_requests(&self) -> Vec<(ConversationId, u32)> {
        self.lock().history_requests.clone()
    }
}

impl DirectoryState {
    fn new_conversation(&mut self, counterpart: UserId) -> Conversation {
        let id = self.next_conversation_id;
        self.next_conversation_id += 1;
        self.clock += TimeDelta::seconds(1);
        Conversation::new(id, self.local_user, counterpart, self.clock)
    }

    fn check_available(&self) -> Result<(), SimDirectoryError> {
        if self.unavailable { Err(SimDirectoryError::Unavailable) } else { Ok(()) }
    }
}

impl ConversationDirectory for SimDirectory {
    type Error = SimDirectoryError;

    async fn list_conversations(&mut self) -> Result<Vec<Conversation>, Self::Error> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.conversations.clone())
    }

    async fn fetch_history(
        &mut self,
        conversation_id: ConversationId,
        page: u32,
    ) -> Result<HistoryPage, Self::Error> {
        let mut state = self.lock();
        state.history_requests.push((conversation_id, page));
        state.check_available()?;

        let messages = state
            .history
            .get(&conversation_id)
            .ok_or(SimDirectoryError::UnknownConversation(conversation_id))?;

        // Page 1 is the newest slice.
        let skip = (page.max(1) as usize - 1) * HISTORY_PAGE_SIZE;
        let end = messages.len().saturating_sub(skip);
        let start = end.saturating_sub(HISTORY_PAGE_SIZE);
        Ok(HistoryPage { messages: messages[start..end].to_vec(), has_next: start > 0 })
    }

    async fn create_conversation(
        &mut self,
        counterpart: UserId,
    ) -> Result<Conversation, Self::Error> {
        let mut state = self.lock();
        state.check_available()?;
        let conversation = state.new_conversation(counterpart);
        state.conversations.push(conversation.clone());
        state.history.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn update_message_status(
        &mut self,
        message_id: MessageId,
        status: MessageStatus,
    ) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.check_available()?;
        state.status_updates.push((message_id, status));
        for message in state.history.values_mut().flatten() {
            if message.id == message_id {
                message.status = status;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_pages_newest_first() {
        let mut directory = SimDirectory::new(7);
        let lines: Vec<String> = (0..45).map(|i| format!("m{i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let id = directory.seed(9, &refs);

        let first = directory.fetch_history(id, 1).await.unwrap();
        assert_eq!(first.messages.len(), HISTORY_PAGE_SIZE);
        assert_eq!(first.messages.last().unwrap().content, "m44");
        assert!(first.has_next);

        let last = directory.fetch_history(id, 3).await.unwrap();
        assert_eq!(last.messages.len(), 5);
        assert_eq!(last.messages[0].content, "m0");
        assert!(!last.has_next);

        let beyond = directory.fetch_history(id, 4).await.unwrap();
        assert!(beyond.messages.is_empty());
    }

    #[tokio::test]
    async fn unavailable_directory_fails() {
        let mut directory = SimDirectory::new(7);
        directory.set_unavailable(true);
        assert_eq!(directory.list_conversations().await, Err(SimDirectoryError::Unavailable));
    }

    #[tokio::test]
    async fn created_conversations_are_listed() {
        let mut directory = SimDirectory::new(7);
        let created = directory.create_conversation(9).await.unwrap();
        let listed = directory.list_conversations().await.unwrap();
        assert_eq!(listed, vec![created]);
    }
}
