//! Fuzz target for gateway frame decoding
//!
//! Feeds arbitrary text through `GatewayFrame::from_json` and both event
//! decoders to find:
//! - Panics on malformed JSON or wrong payload shapes
//! - Frames that decode but fail to re-encode
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{GatewayEvent, GatewayFrame, OutboundEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = GatewayFrame::from_json(text) else {
        return;
    };

    if let Ok(event) = GatewayEvent::decode(&frame) {
        let name = event.name();
        let encoded = event.into_frame().expect("decoded event must re-encode");
        assert_eq!(encoded.event, name);
    }

    if let Ok(event) = OutboundEvent::decode(&frame) {
        let encoded = event.clone().into_frame().expect("decoded emission must re-encode");
        assert_eq!(OutboundEvent::decode(&encoded).ok(), Some(event));
    }

    let _ = frame.to_json();
});
