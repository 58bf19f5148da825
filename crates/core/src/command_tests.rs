// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

use ActivityCommand::*;

// --- dominance lattice ---

#[parameterized(
    cancel_beats_stop = { Cancel, Stop, Cancel },
    stop_beats_complete = { Stop, Complete, Stop },
    complete_beats_pause = { Complete, Pause, Complete },
    pause_beats_start = { Pause, Start, Pause },
    start_beats_none = { Start, None, Start },
    none_is_identity = { None, None, None },
)]
fn merge_dominance(a: ActivityCommand, b: ActivityCommand, expected: ActivityCommand) {
    assert_eq!(a.merge(b), expected);
    assert_eq!(b.merge(a), expected);
}

fn any_command() -> impl Strategy<Value = ActivityCommand> {
    prop_oneof![
        Just(None),
        Just(Start),
        Just(Pause),
        Just(Complete),
        Just(Stop),
        Just(Cancel),
    ]
}

proptest! {
    #[test]
    fn merge_is_commutative(a in any_command(), b in any_command()) {
        prop_assert_eq!(a.merge(b), b.merge(a));
    }

    #[test]
    fn merge_is_idempotent(a in any_command()) {
        prop_assert_eq!(a.merge(a), a);
    }

    #[test]
    fn merge_is_associative(a in any_command(), b in any_command(), c in any_command()) {
        prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
    }
}

// --- event mapping ---

#[test]
fn none_announces_nothing() {
    assert_eq!(None.as_event(), Option::None);
}

#[parameterized(
    start = { Start, ActivityEvent::Start },
    pause = { Pause, ActivityEvent::Pause },
    complete = { Complete, ActivityEvent::Complete },
    stop = { Stop, ActivityEvent::Stop },
    cancel = { Cancel, ActivityEvent::Cancel },
)]
fn command_events(cmd: ActivityCommand, event: ActivityEvent) {
    assert_eq!(cmd.as_event(), Some(event));
}

#[test]
fn terminal_commands() {
    assert!(Cancel.is_terminal());
    assert!(Stop.is_terminal());
    assert!(Complete.is_terminal());
    assert!(!Pause.is_terminal());
    assert!(!Start.is_terminal());
    assert!(!None.is_terminal());
}

#[test]
fn serde_uses_lowercase() {
    assert_eq!(serde_json::to_string(&Cancel).unwrap(), "\"cancel\"");
}
