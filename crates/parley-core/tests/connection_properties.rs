//! Property-based tests for the connection lifecycle.
//!
//! The manager is driven with arbitrary user, resolver and transport inputs
//! while a model tracks how many transports the emitted actions would leave
//! open. There must never be more than one.

use std::time::Duration;

use parley_core::{
    ConnectionAction, ConnectionManager, ConnectionState, Credentials, DisconnectKind, Identity,
    ReconnectConfig, ReconnectPolicy, Role,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Resolve(Option<&'static str>),
    Handshake,
    Lost(DisconnectKind),
    ReconnectDue,
    Disconnect,
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Connect),
        3 => prop_oneof![Just(None), Just(Some("t1")), Just(Some("t2")), Just(Some("  "))]
            .prop_map(Op::Resolve),
        3 => Just(Op::Handshake),
        3 => prop_oneof![
            Just(DisconnectKind::Transient),
            Just(DisconnectKind::Terminal),
            Just(DisconnectKind::Local),
        ]
        .prop_map(Op::Lost),
        2 => Just(Op::ReconnectDue),
        1 => Just(Op::Disconnect),
        1 => Just(Op::Reset),
    ]
}

fn credentials(token: &str) -> Credentials {
    Credentials::new(token, Identity::new(7, "ana", Role::Customer))
}

proptest! {
    #[test]
    fn prop_backoff_doubles_until_exhausted(
        base_ms in 1u64..10_000,
        max_attempts in 0u32..12,
    ) {
        let base_delay = Duration::from_millis(base_ms);
        let mut policy = ReconnectPolicy::new(ReconnectConfig { base_delay, max_attempts });

        for attempt in 0..max_attempts {
            prop_assert_eq!(policy.next_delay(), Some(base_delay * 2u32.pow(attempt)));
        }
        prop_assert!(policy.is_exhausted());
        prop_assert_eq!(policy.next_delay(), None);
        prop_assert_eq!(policy.attempts(), max_attempts);
    }

    #[test]
    fn prop_at_most_one_transport(ops in prop::collection::vec(op_strategy(), 0..100)) {
        let mut conn = ConnectionManager::default();
        let mut transport_open = false;

        for op in ops {
            let state_before = conn.state();
            let actions = match op {
                Op::Connect => conn.connect(),
                Op::Resolve(token) => {
                    conn.credentials_resolved(token.map(credentials)).unwrap_or_default()
                },
                Op::Handshake => {
                    let _ = conn.handshake();
                    Vec::new()
                },
                Op::Lost(kind) => {
                    let actions = conn.handle_disconnect(kind, "lost");
                    if state_before != ConnectionState::Disconnected {
                        transport_open = false;
                        prop_assert_eq!(conn.last_disconnect().map(|d| d.kind), Some(kind));
                    }
                    if kind != DisconnectKind::Transient {
                        let schedules_reconnect = actions.iter().any(|a| matches!(
                            a,
                            ConnectionAction::ScheduleReconnect { .. }
                        ));
                        prop_assert!(!schedules_reconnect);
                    }
                    actions
                },
                Op::ReconnectDue => conn.reconnect_due(),
                Op::Disconnect => conn.disconnect(),
                Op::Reset => conn.reset(),
            };

            for action in actions {
                match action {
                    ConnectionAction::Open { .. } => {
                        prop_assert!(!transport_open, "open while a transport is live");
                        transport_open = true;
                    },
                    ConnectionAction::Close => transport_open = false,
                    _ => {},
                }
            }

            if conn.reconnect_pending() {
                prop_assert_eq!(conn.state(), ConnectionState::Disconnected);
            }
            if conn.is_connected() {
                prop_assert!(conn.identity().is_some());
            }
        }
    }
}
