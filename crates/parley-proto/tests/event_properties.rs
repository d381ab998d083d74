//! Property-based tests for gateway event decoding.
//!
//! Encoding any well-formed event and decoding its frame must give the same
//! event back, and no input frame may cause a panic during decode.

use chrono::{DateTime, TimeZone, Utc};
use parley_proto::{
    GatewayEvent, GatewayFrame, MessageStatus, NewMessage, OutboundEvent, ProtocolError,
    UserTyping,
};
use proptest::prelude::*;
use serde_json::{Value, json};

fn status_strategy() -> impl Strategy<Value = MessageStatus> {
    prop_oneof![
        Just(MessageStatus::Sent),
        Just(MessageStatus::Delivered),
        Just(MessageStatus::Read),
        Just(MessageStatus::Failed),
    ]
}

fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_filter_map("valid timestamp", |secs| {
        Utc.timestamp_opt(secs, 0).single()
    })
}

fn new_message_strategy() -> impl Strategy<Value = NewMessage> {
    (
        1u64..u64::MAX,
        any::<bool>(),
        any::<u64>(),
        any::<u64>(),
        "[ -~]{0,64}",
        status_strategy(),
        timestamp_strategy(),
        proptest::option::of("temp_[0-9]{1,4}"),
    )
        .prop_map(|(id, echo, conversation_id, sender_id, content, status, created_at, temp_id)| {
            NewMessage {
                id: Some(id),
                message_id: echo.then_some(id),
                conversation_id,
                sender_id,
                content,
                status,
                created_at,
                temp_id,
            }
        })
}

fn gateway_event_strategy() -> impl Strategy<Value = GatewayEvent> {
    prop_oneof![
        Just(GatewayEvent::Connect),
        "[ -~]{0,32}".prop_map(|r| GatewayEvent::Disconnect(parley_proto::Disconnect::new(r))),
        new_message_strategy().prop_map(GatewayEvent::NewMessage),
        (any::<u64>(), any::<u64>(), "[a-z]{1,12}", any::<bool>()).prop_map(
            |(conversation_id, user_id, username, is_typing)| {
                GatewayEvent::UserTyping(UserTyping {
                    conversation_id,
                    user_id,
                    username,
                    is_typing,
                })
            }
        ),
    ]
}

fn outbound_strategy() -> impl Strategy<Value = OutboundEvent> {
    prop_oneof![
        any::<u64>().prop_map(OutboundEvent::join),
        (any::<u64>(), "[ -~]{0,64}", "temp_[0-9]{1,4}")
            .prop_map(|(c, content, temp)| OutboundEvent::send(c, content, temp)),
        (any::<u64>(), any::<bool>()).prop_map(|(c, t)| OutboundEvent::typing(c, t)),
    ]
}

proptest! {
    #[test]
    fn gateway_events_survive_the_wire(event in gateway_event_strategy()) {
        let text = event.clone().into_frame().unwrap().to_json().unwrap();
        let frame = GatewayFrame::from_json(&text).unwrap();
        prop_assert_eq!(GatewayEvent::decode(&frame).unwrap(), event);
    }

    #[test]
    fn outbound_events_survive_the_wire(event in outbound_strategy()) {
        let text = event.clone().into_frame().unwrap().to_json().unwrap();
        let frame = GatewayFrame::from_json(&text).unwrap();
        prop_assert_eq!(OutboundEvent::decode(&frame).unwrap(), event);
    }

    #[test]
    fn arbitrary_text_never_panics(text in ".{0,256}") {
        if let Ok(frame) = GatewayFrame::from_json(&text) {
            let _ = GatewayEvent::decode(&frame);
        }
    }

    #[test]
    fn unknown_event_names_are_rejected(name in "[a-z_]{1,24}") {
        prop_assume!(!matches!(
            name.as_str(),
            "connect" | "disconnect" | "connected" | "new_message" | "user_typing" | "error"
        ));
        let frame = GatewayFrame::new(name.clone(), Value::Null);
        prop_assert_eq!(GatewayEvent::decode(&frame), Err(ProtocolError::UnknownEvent(name)));
    }

    #[test]
    fn new_message_field_of_wrong_type_is_malformed(
        field in prop::sample::select(vec![
            "conversation_id",
            "sender_id",
            "content",
            "status",
            "created_at",
        ]),
    ) {
        let mut data = json!({
            "id": 9,
            "conversation_id": 1,
            "sender_id": 2,
            "content": "hi",
            "status": "sent",
            "created_at": "2024-05-01T10:00:00Z",
        });
        data[field] = json!([true]);
        let frame = GatewayFrame::new("new_message", data);
        let is_malformed = matches!(
            GatewayEvent::decode(&frame),
            Err(ProtocolError::MalformedPayload { event: "new_message", .. })
        );
        prop_assert!(is_malformed);
    }
}
