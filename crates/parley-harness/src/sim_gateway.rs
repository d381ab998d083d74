//! In-memory gateway implementing [`GatewayDriver`].
//!
//! Plays the server side of the gateway protocol: answers an open with
//! `connect`, optionally echoes `send_message` back as a confirmed
//! `new_message`, and lets tests inject arbitrary events or cut the
//! connection.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parley_app::GatewayDriver;
use parley_proto::{
    ConversationId, Disconnect, GatewayEvent, GatewayFrame, MessageId, MessageStatus, NewMessage,
    OutboundEvent, ProtocolError, UserId,
};
use thiserror::Error;
use tokio::{sync::Notify, time::Instant};

/// Errors returned by [`SimGateway`].
#[derive(Debug, Error)]
pub enum SimGatewayError {
    /// Open refused by the test script.
    #[error("connection refused")]
    Refused,

    /// Send on a closed transport.
    #[error("transport not open")]
    NotOpen,

    /// The client sent something the gateway cannot decode.
    #[error("undecodable emission: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug)]
struct SharedState {
    local_user: UserId,
    open: bool,
    closing: bool,
    refuse_opens: bool,
    auto_confirm: bool,
    next_message_id: MessageId,
    clock: DateTime<Utc>,
    inbound: VecDeque<GatewayFrame>,
    sent: Vec<OutboundEvent>,
    opens: Vec<(String, Instant)>,
}

/// Scripted gateway.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct SimGateway {
    state: Arc<Mutex<SharedState>>,
    wake: Arc<Notify>,
}

impl SimGateway {
    /// Gateway for a session of `local_user`, confirming sends by default.
    pub fn new(local_user: UserId) -> Self {
        let state = SharedState {
            local_user,
            open: false,
            closing: false,
            refuse_opens: false,
            auto_confirm: true,
            next_message_id: 1000,
            clock: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            inbound: VecDeque::new(),
            sent: Vec::new(),
            opens: Vec::new(),
        };
        Self { state: Arc::new(Mutex::new(state)), wake: Arc::new(Notify::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse (or accept again) every open.
    pub fn refuse_opens(&self, refuse: bool) {
        self.lock().refuse_opens = refuse;
    }

    /// Echo `send_message` back as a confirmed `new_message`.
    pub fn set_auto_confirm(&self, enabled: bool) {
        self.lock().auto_confirm = enabled;
    }

    /// Deliver an event to the client.
    pub fn inject(&self, event: GatewayEvent) -> Result<(), SimGatewayError> {
        self.inject_frame(event.into_frame()?);
        Ok(())
    }

    /// Deliver a raw frame to the client.
    pub fn inject_frame(&self, frame: GatewayFrame) {
        self.lock().inbound.push_back(frame);
        self.wake.notify_one();
    }

    /// Send a message from another participant, stamped one second after the
    /// previous simulated message.
    pub fn deliver_from(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<MessageId, SimGatewayError> {
        let payload = {
            let mut state = self.lock();
            state.build_message(sender_id, conversation_id, content, None)
        };
        let id = payload.id.unwrap_or_default();
        self.inject(GatewayEvent::NewMessage(payload))?;
        Ok(id)
    }

    /// End the session from the server side: a `disconnect` event, then the
    /// transport closes.
    pub fn disconnect(&self, reason: &str) -> Result<(), SimGatewayError> {
        let frame = GatewayEvent::Disconnect(Disconnect::new(reason)).into_frame()?;
        {
            let mut state = self.lock();
            state.inbound.push_back(frame);
            state.closing = true;
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Lose the transport without any event.
    pub fn sever(&self) {
        {
            let mut state = self.lock();
            state.open = false;
            state.closing = false;
            state.inbound.clear();
        }
        self.wake.notify_one();
    }

    /// Take every emission the client sent so far.
    pub fn take_sent(&self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Tokens and times of every open attempt, refused ones included.
    pub fn opens(&self) -> Vec<(String, Instant)> {
        self.lock().opens.clone()
    }
}

impl SharedState {
    fn build_message(
        &mut self,
        sender_id: UserId,
        conversation_id: ConversationId,
        content: &str,
        temp_id: Option<String>,
    ) -> NewMessage {
        self.next_message_id += 1;
        self.clock += TimeDelta::seconds(1);
        NewMessage {
            id: Some(self.next_message_id),
            message_id: Some(self.next_message_id),
            conversation_id,
            sender_id,
            content: content.to_owned(),
            status: MessageStatus::Sent,
            created_at: self.clock,
            temp_id,
        }
    }
}

impl GatewayDriver for SimGateway {
    type Error = SimGatewayError;

    async fn open(&mut self, token: &str) -> Result<(), Self::Error> {
        {
            let mut state = self.lock();
            state.opens.push((token.to_owned(), Instant::now()));
            if state.refuse_opens {
                tracing::debug!("sim gateway refused open");
                return Err(SimGatewayError::Refused);
            }
            state.open = true;
            state.closing = false;
            state.inbound.clear();
            state.inbound.push_back(GatewayFrame::bare(GatewayEvent::CONNECT));
        }
        self.wake.notify_one();
        Ok(())
    }

    async fn send(&mut self, frame: GatewayFrame) -> Result<(), Self::Error> {
        let event = OutboundEvent::decode(&frame)?;
        let mut state = self.lock();
        if !state.open || state.closing {
            return Err(SimGatewayError::NotOpen);
        }

        if state.auto_confirm
            && let OutboundEvent::SendMessage(send) = &event
        {
            let local_user = state.local_user;
            let payload = state.build_message(
                local_user,
                send.conversation_id,
                &send.content,
                Some(send.temp_id.clone()),
            );
            let echo = GatewayEvent::NewMessage(payload).into_frame()?;
            state.inbound.push_back(echo);
            self.wake.notify_one();
        }

        state.sent.push(event);
        Ok(())
    }

    async fn recv(&mut self) -> Option<GatewayFrame> {
        loop {
            {
                let mut state = self.lock();
                if let Some(frame) = state.inbound.pop_front() {
                    return Some(frame);
                }
                if !state.open {
                    return None;
                }
                if state.closing {
                    state.open = false;
                    state.closing = false;
                    return None;
                }
            }
            self.wake.notified().await;
        }
    }

    async fn close(&mut self) {
        let mut state = self.lock();
        state.open = false;
        state.closing = false;
        state.inbound.clear();
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}
