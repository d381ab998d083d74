//! Gateway wire protocol for Parley.
//!
//! The gateway speaks JSON text frames shaped as `{"event": name, "data":
//! object}`. This crate owns that envelope ([`GatewayFrame`]), the closed set of
//! inbound events ([`GatewayEvent`]), the outbound emissions
//! ([`OutboundEvent`]), and the payload structs they carry.
//!
//! Decoding is strict: unknown event names, missing fields, and values of the
//! wrong shape are all reported as [`ProtocolError`]. Callers decide what to do
//! with a bad frame; the sync engine drops and logs it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod event;
mod frame;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use event::{GatewayEvent, OutboundEvent};
pub use frame::GatewayFrame;
pub use payloads::{
    ConversationId, MessageId, UserId,
    chat::{MessageStatus, NewMessage, SendMessage},
    presence::{Typing, UserTyping},
    session::{ConnectedAck, Disconnect, DisconnectReason, ErrorPayload, JoinConversation},
};
