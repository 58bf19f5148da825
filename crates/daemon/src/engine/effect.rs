// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent out-calls the engine needs performed.
//!
//! The engine loop mutates state synchronously and accumulates effects; the
//! executor performs them against the adapters and feeds completions back in
//! as [`Signal`]s. Every suspension point in the system is an effect.
//!
//! [`Signal`]: crate::engine::signal::Signal

use serde_json::Value;
use std::time::Duration;

use am_core::{ActivityId, CmdId};

/// Timers the engine arms. One logical timer per id; re-arming replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// The schedule queue's single next-wake timer.
    ScheduleWake,
    /// Background-interactive yield timeout.
    InteractiveYield,
}

/// Store operation carried by a persist dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Create or overwrite the Activity document.
    Put { doc_id: Option<String>, rev: Option<u64>, doc: Value },
    /// Delete by document id.
    Del { doc_id: String, rev: Option<u64> },
}

/// Effects that need to be executed by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open the trigger's event-source subscription.
    TriggerSubscribe { activity_id: ActivityId, method: String, params: Value },

    /// Drop the trigger's event-source subscription.
    TriggerCancel { activity_id: ActivityId },

    /// Invoke the Activity's callback RPC.
    InvokeCallback { activity_id: ActivityId, method: String, params: Value },

    /// Ask the power daemon to take the Activity's wake-lock.
    PowerBegin { activity_id: ActivityId },

    /// Ask the power daemon to drop the wake-lock, optionally after holding a
    /// debounce window so a quick restart can reuse it.
    PowerEnd { activity_id: ActivityId, debounce: Option<Duration> },

    /// Run a persistence command against the document store.
    PersistDispatch { cmd_id: CmdId, op: StoreOp },

    /// Arm (or re-arm) a timer.
    SetTimer { id: TimerId, delay: Duration },

    /// Cancel a timer; the fired signal for it will not arrive.
    CancelTimer { id: TimerId },

    /// Push new priority/focus onto a resource container's controls.
    ContainerApply { container: String, priority: am_core::ActivityPriority, focused: bool },

    /// Write a pid into a container's task list.
    ContainerMapPid { container: String, pid: u32 },
}

impl Effect {
    /// Effect name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::TriggerSubscribe { .. } => "trigger_subscribe",
            Effect::TriggerCancel { .. } => "trigger_cancel",
            Effect::InvokeCallback { .. } => "invoke_callback",
            Effect::PowerBegin { .. } => "power_begin",
            Effect::PowerEnd { .. } => "power_end",
            Effect::PersistDispatch { .. } => "persist_dispatch",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
            Effect::ContainerApply { .. } => "container_apply",
            Effect::ContainerMapPid { .. } => "container_map_pid",
        }
    }

    /// Whether to log start and completion, or stay quiet for frequent
    /// signaling effects.
    pub fn verbose(&self) -> bool {
        !matches!(self, Effect::SetTimer { .. } | Effect::CancelTimer { .. })
    }
}

/// Accumulator threaded through state transitions.
#[derive(Debug, Default)]
pub struct Fx {
    effects: Vec<Effect>,
}

impl Fx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
