//! Property-based tests for the supervisor invariants.
//!
//! These tests use proptest to verify:
//! - The state machine only ever follows legal edges
//! - The health score stays within [0, 100] for any event sequence
//! - Backoff delays are monotone within an episode and never exceed the cap

use std::time::Duration;

use proptest::prelude::*;

use crate::health::{HealthConfig, HealthMonitor};
use crate::session::{ConnectionState, DisconnectReason, ReconnectPolicy};
use crate::transport::TransportEvent;

// =============================================================================
// State machine model
// =============================================================================

/// The operations a supervisor reacts to, reduced to their state effect.
#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Stop,
    Open,
    Close(u16),
    TimerFire,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Stop),
        Just(Op::Open),
        any::<u16>().prop_map(Op::Close),
        Just(Op::TimerFire),
    ]
}

/// Pure mirror of the supervisor's transition decisions.
fn apply(state: ConnectionState, op: Op) -> ConnectionState {
    use ConnectionState::*;
    match op {
        Op::Start => match state {
            Connecting | Connected => state,
            _ => Connecting,
        },
        Op::Stop => Disconnected,
        Op::Open => match state {
            Connecting | Reconnecting => Connected,
            _ => state,
        },
        Op::Close(code) => match state {
            Disconnected | Failed => state,
            _ => {
                if DisconnectReason::classify(code).is_recoverable() {
                    Reconnecting
                } else {
                    Failed
                }
            }
        },
        Op::TimerFire => match state {
            Reconnecting => Connecting,
            _ => state,
        },
    }
}

fn arb_tick_state() -> impl Strategy<Value = ConnectionState> {
    prop_oneof![
        Just(ConnectionState::Disconnected),
        Just(ConnectionState::Connecting),
        Just(ConnectionState::Connected),
        Just(ConnectionState::Reconnecting),
        Just(ConnectionState::Failed),
    ]
}

/// Health monitor inputs, one per update.
#[derive(Debug, Clone)]
enum HealthOp {
    Opened,
    Closed(u16),
    Tick {
        state: ConnectionState,
        reachable: bool,
        credentials_present: bool,
    },
    Activity,
}

fn arb_health_op() -> impl Strategy<Value = HealthOp> {
    prop_oneof![
        Just(HealthOp::Opened),
        any::<u16>().prop_map(HealthOp::Closed),
        (arb_tick_state(), any::<bool>(), any::<bool>()).prop_map(
            |(state, reachable, credentials_present)| HealthOp::Tick {
                state,
                reachable,
                credentials_present,
            }
        ),
        Just(HealthOp::Activity),
    ]
}

proptest! {
    #[test]
    fn state_machine_only_follows_legal_edges(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut state = ConnectionState::Disconnected;
        for op in ops {
            let next = apply(state, op);
            prop_assert!(
                state == next || state.can_transition_to(next),
                "illegal edge {state} -> {next} via {op:?}"
            );
            state = next;
        }
    }

    #[test]
    fn failed_is_only_left_through_start_or_stop(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut state = ConnectionState::Failed;
        for op in ops {
            let next = apply(state, op);
            if state == ConnectionState::Failed && next != ConnectionState::Failed {
                prop_assert!(matches!(op, Op::Start | Op::Stop));
            }
            state = next;
        }
    }

    #[test]
    fn health_score_clamp_holds(ops in prop::collection::vec(arb_health_op(), 1..200)) {
        let mut monitor = HealthMonitor::new(
            HealthConfig::default().with_staleness_threshold(Duration::ZERO),
        );
        for op in ops {
            match op {
                HealthOp::Opened => monitor.on_transport_event(&TransportEvent::Opened),
                HealthOp::Closed(code) => monitor.on_transport_event(&TransportEvent::Closed {
                    code,
                    message: String::new(),
                }),
                HealthOp::Tick { state, reachable, credentials_present } => {
                    let result = crate::diagnostics::DiagnosticsResult {
                        reachable,
                        credentials_present,
                        details: vec![],
                    };
                    monitor.tick(state, Some(&result));
                }
                HealthOp::Activity => monitor.record_activity(),
            }
            prop_assert!(monitor.snapshot().score <= 100);
        }
    }

    #[test]
    fn backoff_is_monotone_and_capped(
        base_ms in 1u64..10_000,
        factor in 1.0f64..4.0,
        max_ms in 1u64..600_000,
        retries in 1usize..100,
    ) {
        let max = Duration::from_millis(max_ms);
        let mut policy = ReconnectPolicy::new(
            Duration::from_millis(base_ms),
            factor,
            max,
            u32::MAX,
        );
        let mut previous = Duration::ZERO;
        for _ in 0..retries {
            let delay = policy.next_delay();
            prop_assert!(delay >= previous);
            prop_assert!(delay <= max);
            previous = delay;
        }

        policy.reset();
        prop_assert_eq!(policy.attempt(), 0);
        let first = policy.next_delay();
        prop_assert_eq!(first, Duration::from_millis(base_ms).min(max));
    }
}
