//! Fuzz target for the sync engine state machine
//!
//! Drives a client through arbitrary interleavings of user intents, gateway
//! traffic and timer firings.
//!
//! # Invariants
//!
//! - Every registry invariant holds after every event
//! - No confirmed message id is cached twice per conversation
//! - Typing emissions only happen while connected

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_client::{Client, ClientAction, ClientEvent, MessageKey, SyncConfig};
use parley_core::{
    ConnectionState, Credentials, Identity, Role, TimerSlot, TimerToken,
    env::{Environment, test_utils::MockEnv},
};
use parley_harness::InvariantRegistry;
use parley_proto::{
    Disconnect, GatewayEvent, GatewayFrame, MessageStatus, NewMessage, OutboundEvent, UserTyping,
};

const LOCAL: u64 = 7;

#[derive(Debug, Clone, Arbitrary)]
enum ClientOp {
    Connect,
    Disconnect,
    Logout,
    Resolve { present: bool, blank: bool },
    Handshake,
    ServerDisconnect { terminal: bool },
    TransportLost,
    Send { conversation: u8, content: String },
    Retry { conversation: u8, temp: u8 },
    Inbound { id: u8, conversation: u8, from_self: bool, temp: Option<u8>, failed: bool },
    Typing { conversation: u8, user: u8, is_typing: bool },
    Keystroke { conversation: u8 },
    Activate { conversation: Option<u8> },
    MarkRead { conversation: u8 },
    LoadOlder { conversation: u8, fails: bool },
    FireTimer { typing: bool },
    Tick { millis: u16 },
    RawFrame { event: String, json: String },
}

fn conversation(raw: u8) -> u64 {
    u64::from(raw % 4) + 1
}

fuzz_target!(|ops: Vec<ClientOp>| {
    let env = MockEnv::new();
    let mut client = Client::new(env.clone(), SyncConfig::default());
    let registry = InvariantRegistry::standard();
    let mut tokens: Vec<(TimerSlot, TimerToken)> = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
        let state_before = client.connection_state();
        let event = match op {
            ClientOp::Connect => ClientEvent::Connect,
            ClientOp::Disconnect => ClientEvent::Disconnect,
            ClientOp::Logout => ClientEvent::Logout,
            ClientOp::Resolve { present, blank } => {
                let token = if blank { " " } else { "token" };
                let identity = Identity::new(LOCAL, "ana", Role::Vendor);
                ClientEvent::CredentialsResolved(
                    present.then(|| Credentials::new(token, identity)),
                )
            },
            ClientOp::Handshake => frame(GatewayEvent::Connect),
            ClientOp::ServerDisconnect { terminal } => {
                let reason = if terminal { Disconnect::SERVER_INITIATED } else { "ping timeout" };
                frame(GatewayEvent::Disconnect(Disconnect::new(reason)))
            },
            ClientOp::TransportLost => ClientEvent::TransportLost { reason: "fuzz".into() },
            ClientOp::Send { conversation: c, content } => {
                ClientEvent::SendMessage { conversation_id: conversation(c), content }
            },
            ClientOp::Retry { conversation: c, temp } => ClientEvent::RetryMessage {
                conversation_id: conversation(c),
                key: MessageKey::Temp(format!("temp_{}", temp % 8)),
            },
            ClientOp::Inbound { id, conversation: c, from_self, temp, failed } => {
                frame(GatewayEvent::NewMessage(NewMessage {
                    id: Some(u64::from(id % 32) + 1),
                    message_id: None,
                    conversation_id: conversation(c),
                    sender_id: if from_self { LOCAL } else { 9 },
                    content: "x".into(),
                    status: if failed { MessageStatus::Failed } else { MessageStatus::Sent },
                    created_at: env.wall_clock(),
                    temp_id: temp.map(|t| format!("temp_{}", t % 8)),
                }))
            },
            ClientOp::Typing { conversation: c, user, is_typing } => {
                frame(GatewayEvent::UserTyping(UserTyping {
                    conversation_id: conversation(c),
                    user_id: u64::from(user % 3) + LOCAL,
                    username: format!("user{}", user % 3),
                    is_typing,
                }))
            },
            ClientOp::Keystroke { conversation: c } => {
                ClientEvent::Keystroke { conversation_id: conversation(c) }
            },
            ClientOp::Activate { conversation: c } => {
                ClientEvent::SetActiveConversation(c.map(conversation))
            },
            ClientOp::MarkRead { conversation: c } => {
                ClientEvent::MarkRead { conversation_id: conversation(c) }
            },
            ClientOp::LoadOlder { conversation: c, fails: false } => {
                ClientEvent::LoadOlderHistory { conversation_id: conversation(c) }
            },
            ClientOp::LoadOlder { conversation: c, fails: true } => {
                ClientEvent::HistoryUnavailable { conversation_id: conversation(c) }
            },
            ClientOp::FireTimer { typing } => {
                let slot = if typing { TimerSlot::Typing } else { TimerSlot::Reconnect };
                let Some(index) = tokens.iter().position(|(s, _)| *s == slot) else {
                    continue;
                };
                let (slot, token) = tokens.remove(index);
                ClientEvent::TimerFired { slot, token }
            },
            ClientOp::Tick { millis } => {
                env.advance(Duration::from_millis(u64::from(millis)));
                ClientEvent::Tick { now: env.now() }
            },
            ClientOp::RawFrame { event, json } => {
                let data = GatewayFrame::from_json(&json).map(|f| f.data).unwrap_or_default();
                ClientEvent::FrameReceived(GatewayFrame::new(event, data))
            },
        };

        for action in client.handle(event) {
            match action {
                ClientAction::StartTimer { slot, token, .. } => {
                    tokens.retain(|(s, _)| *s != slot);
                    tokens.push((slot, token));
                },
                ClientAction::CancelTimer { slot } => tokens.retain(|(s, _)| *s != slot),
                ClientAction::Emit(OutboundEvent::Typing(_)) => {
                    assert_eq!(
                        state_before,
                        ConnectionState::Connected,
                        "typing emitted while {state_before:?}"
                    );
                },
                _ => {},
            }
        }

        registry.assert_all(&client.snapshot(), &format!("at step {step}"));
    }
});

fn frame(event: GatewayEvent) -> ClientEvent<std::time::Instant> {
    match event.into_frame() {
        Ok(frame) => ClientEvent::FrameReceived(frame),
        Err(_) => ClientEvent::TransportLost { reason: "unencodable".into() },
    }
}
