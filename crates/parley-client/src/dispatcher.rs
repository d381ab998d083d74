//! Outbound gateway emissions.
//!
//! Every emission is fire-and-forget: while the connection is not confirmed
//! it is dropped, never queued for a later reconnect.

use parley_core::ConnectionState;
use parley_proto::{ConversationId, OutboundEvent};

/// Buffers emissions made during one transition.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    outbox: Vec<OutboundEvent>,
    dropped: u64,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `send_message`.
    pub fn send_message(
        &mut self,
        state: ConnectionState,
        conversation_id: ConversationId,
        content: &str,
        temp_id: &str,
    ) {
        self.emit(state, OutboundEvent::send(conversation_id, content, temp_id));
    }

    /// Emit `typing`.
    pub fn set_typing(
        &mut self,
        state: ConnectionState,
        conversation_id: ConversationId,
        is_typing: bool,
    ) {
        self.emit(state, OutboundEvent::typing(conversation_id, is_typing));
    }

    /// Emit `join_conversation`.
    pub fn join_conversation(&mut self, state: ConnectionState, conversation_id: ConversationId) {
        self.emit(state, OutboundEvent::join(conversation_id));
    }

    /// Take the buffered emissions.
    pub fn drain(&mut self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Emissions dropped because the connection was down.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn emit(&mut self, state: ConnectionState, event: OutboundEvent) {
        if state == ConnectionState::Connected {
            self.outbox.push(event);
        } else {
            self.dropped += 1;
            tracing::debug!(
                event = event.name(),
                conversation_id = event.conversation_id(),
                state = state.as_str(),
                "not connected, emission dropped"
            );
        }
    }
}
