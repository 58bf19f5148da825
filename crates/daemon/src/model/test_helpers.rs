// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for model tests: a fully-enabled engine state with
//! registered requirements, plus helpers to create and attach to Activities
//! without going through the wire layer.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::sync::mpsc;

use am_core::{
    ActivityCommand, ActivityEvent, ActivityId, ActivitySpec, BusId, SubscriptionId,
};
use am_wire::EventRecord;

use crate::engine::effect::{Effect, Fx};
use crate::model::activity::Activity;
use crate::model::registry::IdAllocation;
use crate::model::subscription::Subscription;
use crate::model::{EngineConfig, EngineState, ENABLE_MASK};

/// Fixed "now" for deterministic schedule math.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().unwrap()
}

/// Enabled state, monotonic ids, default caps, requirements registered.
pub fn test_state() -> EngineState {
    let config = EngineConfig { allocation: IdAllocation::Monotonic, ..EngineConfig::default() };
    let mut state = EngineState::new(config);
    state.enabled = ENABLE_MASK;
    state.requirements.register("internet", json!(false));
    state.requirements.register("charging", json!(false));
    state
}

pub fn creator() -> BusId {
    BusId::app("com.test.creator")
}

/// Instantiate, register, and insert an Activity from a spec.
pub fn create_activity(state: &mut EngineState, spec: ActivitySpec) -> ActivityId {
    let id = state.registry.allocate_id();
    let mut act = Activity::new(id, spec, creator());
    state.instantiate_gating(&mut act).unwrap();
    state.registry.insert(act);
    state.registry.register_name(id);
    id
}

/// Create and send the external start command.
pub fn create_started(state: &mut EngineState, spec: ActivitySpec, fx: &mut Fx) -> ActivityId {
    let id = create_activity(state, spec);
    state.send_command(id, ActivityCommand::Start, false, now(), fx).unwrap();
    id
}

/// Attach a subscription for `subscriber`, returning its id and the event
/// receiver end.
pub fn subscribe(
    state: &mut EngineState,
    id: ActivityId,
    subscriber: &BusId,
    detailed: bool,
) -> (SubscriptionId, mpsc::UnboundedReceiver<EventRecord>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = Subscription::new(subscriber.clone(), detailed, tx);
    let mut fx = Fx::new();
    let sub_id = state.add_subscription(id, sub, &mut fx).unwrap();
    (sub_id, rx)
}

/// Attach a parent subscription (first subscription becomes parent).
pub fn subscribe_parent(
    state: &mut EngineState,
    id: ActivityId,
    subscriber: &BusId,
) -> (SubscriptionId, mpsc::UnboundedReceiver<EventRecord>) {
    let (sub_id, rx) = subscribe(state, id, subscriber, false);
    let act = state.registry.get_mut(id).unwrap();
    if act.parent.is_none() {
        act.parent = Some(sub_id);
    }
    (sub_id, rx)
}

/// Drain everything delivered so far.
pub fn delivered(rx: &mut mpsc::UnboundedReceiver<EventRecord>) -> Vec<ActivityEvent> {
    let mut out = Vec::new();
    while let Ok(record) = rx.try_recv() {
        out.push(record.event);
    }
    out
}

/// Count effects matching a predicate.
pub fn count_effects(fx: &Fx, pred: impl Fn(&Effect) -> bool) -> usize {
    fx.effects().iter().filter(|e| pred(e)).count()
}
