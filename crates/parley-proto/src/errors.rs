//! Protocol errors.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding gateway frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame text exceeds [`crate::GatewayFrame::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Frame text is not a valid `{event, data}` envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Event name is not part of the gateway protocol.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Payload does not match the shape required by its event.
    #[error("malformed {event} payload: {reason}")]
    MalformedPayload {
        /// Event name whose payload failed to decode
        event: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Serialization failed while building an outbound frame.
    #[error("JSON encode error: {0}")]
    JsonEncode(String),
}

impl ProtocolError {
    pub(crate) fn malformed(event: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload { event, reason: reason.into() }
    }
}
