//! JSON envelope for gateway traffic.
//!
//! Every frame on the wire is a JSON object with two members: the event name
//! and its payload object. Events without a payload (`connect`) carry
//! `null`, which decodes to [`serde_json::Value::Null`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// A single gateway frame: event name plus raw payload.
///
/// The payload stays as an untyped [`Value`] until [`crate::GatewayEvent`]
/// decodes it, so a frame can always be logged or forwarded even when its
/// payload is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Event name (e.g. `new_message`)
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub data: Value,
}

impl GatewayFrame {
    /// Maximum accepted frame size in bytes (1 MiB).
    ///
    /// Checked before JSON parsing so oversized input never reaches the
    /// parser.
    pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

    /// Create a frame from an event name and payload.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    /// Create a frame that carries no payload.
    pub fn bare(event: impl Into<String>) -> Self {
        Self { event: event.into(), data: Value::Null }
    }

    /// Parse a frame from JSON text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooLarge` if `text` exceeds `MAX_FRAME_SIZE`
    /// - `ProtocolError::InvalidEnvelope` if `text` is not an `{event, data}`
    ///   object
    pub fn from_json(text: &str) -> Result<Self> {
        if text.len() > Self::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: text.len(),
                max: Self::MAX_FRAME_SIZE,
            });
        }

        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
    }

    /// Serialize the frame to JSON text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::JsonEncode(e.to_string()))
    }
}
