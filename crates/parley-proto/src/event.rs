//! Inbound and outbound gateway events.
//!
//! # Invariants
//!
//! Each variant maps to exactly one event name (enforced by match
//! exhaustiveness). Decoding an encoded event yields the same value.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    GatewayFrame,
    errors::{ProtocolError, Result},
    payloads::{
        ConversationId,
        chat::{MessageStatus, NewMessage, SendMessage},
        presence::{Typing, UserTyping},
        session::{ConnectedAck, Disconnect, ErrorPayload, JoinConversation},
    },
};

/// Events the gateway delivers to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Transport handshake completed.
    Connect,
    /// Transport closed.
    Disconnect(Disconnect),
    /// Gateway acknowledged the authenticated session.
    Connected(ConnectedAck),
    /// A message was confirmed (ours) or received (theirs).
    NewMessage(NewMessage),
    /// A participant started or stopped typing.
    UserTyping(UserTyping),
    /// Gateway-reported error.
    Error(ErrorPayload),
}

impl GatewayEvent {
    /// `connect` event name.
    pub const CONNECT: &'static str = "connect";
    /// `disconnect` event name.
    pub const DISCONNECT: &'static str = "disconnect";
    /// `connected` event name.
    pub const CONNECTED: &'static str = "connected";
    /// `new_message` event name.
    pub const NEW_MESSAGE: &'static str = "new_message";
    /// `user_typing` event name.
    pub const USER_TYPING: &'static str = "user_typing";
    /// `error` event name.
    pub const ERROR: &'static str = "error";

    /// Wire name of this event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect => Self::CONNECT,
            Self::Disconnect(_) => Self::DISCONNECT,
            Self::Connected(_) => Self::CONNECTED,
            Self::NewMessage(_) => Self::NEW_MESSAGE,
            Self::UserTyping(_) => Self::USER_TYPING,
            Self::Error(_) => Self::ERROR,
        }
    }

    /// Decode a typed event from a frame.
    ///
    /// `new_message` payloads are additionally validated: they must carry a
    /// non-zero id, `id` and `message_id` must agree when both are present,
    /// and the status cannot be `sending`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownEvent` if the event name is not recognized
    /// - `ProtocolError::MalformedPayload` if the payload has the wrong shape
    pub fn decode(frame: &GatewayFrame) -> Result<Self> {
        let event = match frame.event.as_str() {
            Self::CONNECT => Self::Connect,
            Self::DISCONNECT => Self::Disconnect(decode_or_default(Self::DISCONNECT, &frame.data)?),
            Self::CONNECTED => Self::Connected(decode_or_default(Self::CONNECTED, &frame.data)?),
            Self::NEW_MESSAGE => {
                let message: NewMessage = decode_payload(Self::NEW_MESSAGE, &frame.data)?;
                validate_new_message(&message)?;
                Self::NewMessage(message)
            },
            Self::USER_TYPING => Self::UserTyping(decode_payload(Self::USER_TYPING, &frame.data)?),
            Self::ERROR => Self::Error(decode_or_default(Self::ERROR, &frame.data)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        Ok(event)
    }

    /// Encode this event as a frame.
    ///
    /// Clients never send these; the simulated gateway does.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn into_frame(self) -> Result<GatewayFrame> {
        let name = self.name();
        let data = match self {
            Self::Connect => Value::Null,
            Self::Disconnect(inner) => encode_payload(&inner)?,
            Self::Connected(inner) => encode_payload(&inner)?,
            Self::NewMessage(inner) => encode_payload(&inner)?,
            Self::UserTyping(inner) => encode_payload(&inner)?,
            Self::Error(inner) => encode_payload(&inner)?,
        };
        Ok(GatewayFrame::new(name, data))
    }
}

/// Emissions the client sends to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Subscribe to a conversation's events.
    JoinConversation(JoinConversation),
    /// Send a message.
    SendMessage(SendMessage),
    /// Report local typing state.
    Typing(Typing),
}

impl OutboundEvent {
    /// `join_conversation` event name.
    pub const JOIN_CONVERSATION: &'static str = "join_conversation";
    /// `send_message` event name.
    pub const SEND_MESSAGE: &'static str = "send_message";
    /// `typing` event name.
    pub const TYPING: &'static str = "typing";

    /// Build a `join_conversation` emission.
    pub fn join(conversation_id: ConversationId) -> Self {
        Self::JoinConversation(JoinConversation { conversation_id })
    }

    /// Build a `send_message` emission.
    pub fn send(
        conversation_id: ConversationId,
        content: impl Into<String>,
        temp_id: impl Into<String>,
    ) -> Self {
        Self::SendMessage(SendMessage {
            conversation_id,
            content: content.into(),
            temp_id: temp_id.into(),
        })
    }

    /// Build a `typing` emission.
    pub fn typing(conversation_id: ConversationId, is_typing: bool) -> Self {
        Self::Typing(Typing { conversation_id, is_typing })
    }

    /// Wire name of this event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => Self::JOIN_CONVERSATION,
            Self::SendMessage(_) => Self::SEND_MESSAGE,
            Self::Typing(_) => Self::TYPING,
        }
    }

    /// Conversation this emission targets.
    pub const fn conversation_id(&self) -> ConversationId {
        match self {
            Self::JoinConversation(inner) => inner.conversation_id,
            Self::SendMessage(inner) => inner.conversation_id,
            Self::Typing(inner) => inner.conversation_id,
        }
    }

    /// Encode this emission as a frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn into_frame(self) -> Result<GatewayFrame> {
        let name = self.name();
        let data = match self {
            Self::JoinConversation(inner) => encode_payload(&inner)?,
            Self::SendMessage(inner) => encode_payload(&inner)?,
            Self::Typing(inner) => encode_payload(&inner)?,
        };
        Ok(GatewayFrame::new(name, data))
    }

    /// Decode an emission from a frame (gateway side).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownEvent` if the event name is not recognized
    /// - `ProtocolError::MalformedPayload` if the payload has the wrong shape
    pub fn decode(frame: &GatewayFrame) -> Result<Self> {
        let event = match frame.event.as_str() {
            Self::JOIN_CONVERSATION => {
                Self::JoinConversation(decode_payload(Self::JOIN_CONVERSATION, &frame.data)?)
            },
            Self::SEND_MESSAGE => {
                Self::SendMessage(decode_payload(Self::SEND_MESSAGE, &frame.data)?)
            },
            Self::TYPING => Self::Typing(decode_payload(Self::TYPING, &frame.data)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }
}

fn decode_payload<T: DeserializeOwned>(event: &'static str, data: &Value) -> Result<T> {
    T::deserialize(data).map_err(|e| ProtocolError::malformed(event, e.to_string()))
}

/// Like [`decode_payload`], but a `null` payload yields `T::default()`.
fn decode_or_default<T>(event: &'static str, data: &Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if data.is_null() { Ok(T::default()) } else { decode_payload(event, data) }
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::JsonEncode(e.to_string()))
}

fn validate_new_message(message: &NewMessage) -> Result<()> {
    if message.confirmed_id().is_none() {
        return Err(ProtocolError::malformed(GatewayEvent::NEW_MESSAGE, "missing message id"));
    }

    if let (Some(id), Some(message_id)) = (message.id, message.message_id)
        && id != message_id
    {
        return Err(ProtocolError::malformed(
            GatewayEvent::NEW_MESSAGE,
            format!("id {id} disagrees with message_id {message_id}"),
        ));
    }

    if message.status == MessageStatus::Sending {
        return Err(ProtocolError::malformed(
            GatewayEvent::NEW_MESSAGE,
            "confirmed message cannot be in sending state",
        ));
    }

    Ok(())
}
