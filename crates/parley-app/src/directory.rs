//! Conversation directory collaborator.
//!
//! The request/response side of the backend: listing and creating
//! conversations, paging history, and persisting status changes. The runtime
//! awaits these calls between transitions and feeds the results back into the
//! client.

use std::future::Future;

use parley_client::{Conversation, HistoryPage};
use parley_proto::{ConversationId, MessageId, MessageStatus, UserId};

/// Backend directory of conversations and their history.
pub trait ConversationDirectory: Send {
    /// Directory-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every conversation the local user takes part in.
    fn list_conversations(
        &mut self,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send;

    /// One page of history, newest page first. Pages are one-based.
    fn fetch_history(
        &mut self,
        conversation_id: ConversationId,
        page: u32,
    ) -> impl Future<Output = Result<HistoryPage, Self::Error>> + Send;

    /// Start a conversation with `counterpart`.
    fn create_conversation(
        &mut self,
        counterpart: UserId,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send;

    /// Persist a message status change.
    fn update_message_status(
        &mut self,
        message_id: MessageId,
        status: MessageStatus,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
