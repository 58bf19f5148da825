// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::engine::effect::Fx;
use crate::model::test_helpers::*;
use am_core::test_support::{callback_spec, fired_trigger, requirement_spec};
use am_wire::ListFlags;

#[test]
fn default_flags_give_identity_and_spec_only() {
    let mut state = test_state();
    let id = create_activity(&mut state, callback_spec("d"));
    let details = build(state.registry.get(id).unwrap(), ListFlags::default());

    assert_eq!(details.activity_id, id);
    assert_eq!(details.spec.name, "d");
    assert!(details.subscribers.is_none());
    assert!(details.current.is_none());
    assert!(details.internal.is_none());
}

#[test]
fn subscribers_flag_lists_identities_once() {
    let mut state = test_state();
    let id = create_activity(&mut state, callback_spec("d"));
    let watcher = am_core::BusId::app("com.test.w");
    let (_a, _rx1) = subscribe(&mut state, id, &watcher, false);
    let (_b, _rx2) = subscribe(&mut state, id, &watcher, false);

    let flags = ListFlags { subscribers: true, ..ListFlags::default() };
    let details = build(state.registry.get(id).unwrap(), flags);
    assert_eq!(details.subscribers.unwrap(), vec![watcher]);
}

#[test]
fn current_flag_reports_gating_snapshot() {
    let mut state = test_state();
    let mut fx = Fx::new();
    let mut spec = requirement_spec("d", "internet");
    spec.trigger = Some(fired_trigger());
    spec.callback = callback_spec("x").callback;
    let id = create_started(&mut state, spec, &mut fx);

    let flags = ListFlags { current: true, ..ListFlags::default() };
    let details = build(state.registry.get(id).unwrap(), flags);
    let current = details.current.unwrap();
    assert_eq!(current["trigger"]["armed"], true);
    assert_eq!(current["trigger"]["triggered"], false);
    assert_eq!(current["requirements"]["internet"]["met"], false);
}

#[test]
fn internal_flag_exposes_the_lifecycle_word() {
    let mut state = test_state();
    let mut fx = Fx::new();
    let id = create_started(&mut state, callback_spec("d"), &mut fx);

    let flags = ListFlags { internal: true, ..ListFlags::default() };
    let details = build(state.registry.get(id).unwrap(), flags);
    let internal = details.internal.unwrap();
    assert!(internal.running);
    assert_eq!(internal.sent_command, am_core::ActivityCommand::Start);
}
