//! Typed payloads carried inside [`crate::GatewayFrame`]s.
//!
//! Field names match the gateway's snake_case JSON exactly; serde derives do
//! all of the shape checking.

pub mod chat;
pub mod presence;
pub mod session;

/// Conversation identifier assigned by the backend.
pub type ConversationId = u64;

/// User identifier assigned by the backend.
pub type UserId = u64;

/// Server-assigned message identifier. `0` means "not yet confirmed".
pub type MessageId = u64;
