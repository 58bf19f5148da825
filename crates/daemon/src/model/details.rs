// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialization of Activities for `list`, `getDetails`, and event records.

use serde_json::json;

use am_wire::{ActivityDetails, InternalDetails, ListFlags};

use crate::model::activity::Activity;

/// Build the client-visible view of one Activity.
///
/// The spec block always appears; `subscribers`, `current`, and `internal`
/// sections are opt-in per the caller's flags.
pub fn build(act: &Activity, flags: ListFlags) -> ActivityDetails {
    let subscribers = flags.subscribers.then(|| act.unique_subscribers());
    let current = flags.current.then(|| current_snapshot(act));
    let internal = flags.internal.then(|| InternalDetails {
        initialized: act.initialized,
        scheduled: act.scheduled,
        ready: act.ready,
        running: act.running,
        ending: act.ending,
        int_command: act.int_command,
        ext_command: act.ext_command,
        sent_command: act.sent_command,
    });
    ActivityDetails {
        activity_id: act.id,
        creator: act.creator.clone(),
        state: act.state(),
        focused: act.focused,
        spec: act.spec.clone(),
        subscribers,
        current,
        internal,
    }
}

/// The live gating snapshot: trigger latch, schedule due time, and
/// per-requirement met/current values.
fn current_snapshot(act: &Activity) -> serde_json::Value {
    let trigger = act.trigger.as_ref().map(|t| {
        json!({"armed": t.is_armed(), "triggered": t.is_triggered()})
    });
    let schedule = act.schedule.as_ref().map(|s| {
        json!({
            "queued": s.is_queued(),
            "due": s.is_due(),
            "nextDue": s.next_due().map(|t| t.to_rfc3339()),
        })
    });
    let requirements: serde_json::Map<String, serde_json::Value> = act
        .requirements
        .values()
        .map(|r| (r.name.clone(), json!({"met": r.met, "current": r.current})))
        .collect();
    json!({
        "trigger": trigger,
        "schedule": schedule,
        "requirements": requirements,
    })
}

#[cfg(test)]
#[path = "details_tests.rs"]
mod tests;
