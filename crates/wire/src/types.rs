// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTOs for `list`, `getDetails`, and `info`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use am_core::{ActivityCommand, ActivityId, ActivitySpec, ActivityState, BusId};

/// Serialized view of one Activity.
///
/// Which optional sections appear is driven by the caller's `ListFlags`; the
/// spec block is always present so a details reply round-trips to `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDetails {
    #[serde(rename = "activityId")]
    pub activity_id: ActivityId,
    pub creator: BusId,
    pub state: ActivityState,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub focused: bool,
    #[serde(flatten)]
    pub spec: ActivitySpec,
    /// Distinct subscriber identities (`subscribers` flag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<Vec<BusId>>,
    /// Current gating snapshot (`current` flag): trigger fired, schedule due,
    /// and per-requirement met values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    /// Internal FSM word (`internal` flag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<InternalDetails>,
}

/// Internal lifecycle word, exposed for debugging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalDetails {
    pub initialized: bool,
    pub scheduled: bool,
    pub ready: bool,
    pub running: bool,
    pub ending: bool,
    #[serde(rename = "intCommand")]
    pub int_command: ActivityCommand,
    #[serde(rename = "extCommand")]
    pub ext_command: ActivityCommand,
    #[serde(rename = "sentCommand")]
    pub sent_command: ActivityCommand,
}

/// One run queue and its occupants, in queue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    pub activities: Vec<ActivityId>,
}

/// Manager state dump for the `info` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerInfo {
    /// Which of {external, ui, configurationLoaded} gate bits are set.
    pub enabled: Vec<String>,
    #[serde(rename = "backgroundConcurrency")]
    pub background_concurrency: Option<u32>,
    #[serde(rename = "backgroundInteractiveConcurrency")]
    pub background_interactive_concurrency: Option<u32>,
    #[serde(rename = "yieldTimeoutSeconds")]
    pub yield_timeout_seconds: u64,
    pub queues: Vec<QueueInfo>,
    /// Resource-binding snapshot: container name → effective priority.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub containers: Value,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
