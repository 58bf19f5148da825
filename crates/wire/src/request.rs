// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from clients to the daemon.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use am_core::{ActivityId, ActivitySpec, CallbackSpec, ScheduleSpec, TriggerSpec};

/// Reference to an Activity by id or by registered name.
///
/// Name lookups resolve against the caller's own `(name, creator)` key unless
/// the daemon runs in anonymous-creator mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRef {
    #[serde(rename = "activityId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ActivityId>,
    #[serde(rename = "activityName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ActivityRef {
    pub fn by_id(id: ActivityId) -> Self {
        Self { id: Some(id), name: None }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self { id: None, name: Some(name.into()) }
    }
}

/// Spec updates applied by `complete` with `restart`.
///
/// Present fields replace the Activity's current declaration; absent fields
/// are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteUpdates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<indexmap::IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CompleteUpdates {
    pub fn is_empty(&self) -> bool {
        self.callback.is_none()
            && self.schedule.is_none()
            && self.trigger.is_none()
            && self.requirements.is_none()
            && self.metadata.is_none()
    }
}

/// Section-selection flags for `list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFlags {
    /// Include the full declarative spec per Activity.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub details: bool,
    /// Include the subscriber identities per Activity.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subscribers: bool,
    /// Report current trigger/requirement values instead of the declaration.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub current: bool,
    /// Include the internal FSM word (flags, command words, queue).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub internal: bool,
}

/// Request from a client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake; also declares the caller's bus identity.
    Hello {
        version: String,
        /// Caller identity as reported by the bus transport.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caller: Option<String>,
    },

    /// Create (and optionally start) a new Activity.
    Create {
        #[serde(rename = "activity")]
        spec: ActivitySpec,
        #[serde(default)]
        subscribe: bool,
        #[serde(rename = "detailedEvents", default)]
        detailed_events: bool,
        #[serde(default)]
        start: bool,
        /// Cancel and atomically replace an existing `(name, creator)` match.
        #[serde(default)]
        replace: bool,
    },

    /// Observe an Activity, optionally subscribing for events.
    Monitor {
        #[serde(flatten)]
        target: ActivityRef,
        #[serde(default)]
        subscribe: bool,
        #[serde(rename = "detailedEvents", default)]
        detailed_events: bool,
    },

    /// Subscription-only attach; fails without `subscribe`.
    Join {
        #[serde(flatten)]
        target: ActivityRef,
        #[serde(default)]
        subscribe: bool,
        #[serde(rename = "detailedEvents", default)]
        detailed_events: bool,
    },

    /// Queue to become the Activity's parent.
    Adopt {
        #[serde(flatten)]
        target: ActivityRef,
        #[serde(default)]
        wait: bool,
        #[serde(default)]
        subscribe: bool,
        #[serde(rename = "detailedEvents", default)]
        detailed_events: bool,
    },

    /// Give up parentage, promoting the next adopter.
    Release {
        #[serde(flatten)]
        target: ActivityRef,
    },

    /// Finish the Activity, optionally restarting it with updates.
    Complete {
        #[serde(flatten)]
        target: ActivityRef,
        #[serde(default)]
        restart: bool,
        /// Creator may force-complete an Activity it doesn't parent.
        #[serde(default)]
        force: bool,
        #[serde(flatten)]
        updates: CompleteUpdates,
    },

    // -- idempotent transition requests --
    Cancel {
        #[serde(flatten)]
        target: ActivityRef,
    },
    Stop {
        #[serde(flatten)]
        target: ActivityRef,
    },
    Pause {
        #[serde(flatten)]
        target: ActivityRef,
    },
    Start {
        #[serde(flatten)]
        target: ActivityRef,
    },
    Schedule {
        #[serde(flatten)]
        target: ActivityRef,
    },

    // -- focus --
    Focus {
        #[serde(flatten)]
        target: ActivityRef,
    },
    Unfocus {
        #[serde(flatten)]
        target: ActivityRef,
    },
    AddFocus {
        #[serde(rename = "sourceId")]
        source_id: ActivityId,
        #[serde(rename = "targetId")]
        target_id: ActivityId,
    },

    // -- queries --
    List {
        #[serde(flatten)]
        flags: ListFlags,
    },
    GetDetails {
        #[serde(flatten)]
        target: ActivityRef,
        #[serde(default)]
        current: bool,
    },
    /// Manager state dump: queues, gate bits, concurrency, bindings.
    Info,

    // -- private bus only --
    /// Bind a process to a resource container.
    MapProcess {
        pid: u32,
        #[serde(rename = "containerName")]
        container_name: String,
        /// Bus ids whose entities move into the container.
        ids: Vec<String>,
    },
    /// Set the EXTERNAL gate bit.
    Enable,
    /// Clear the EXTERNAL gate bit.
    Disable,
}

impl Request {
    /// Methods restricted to the private bus.
    pub fn is_private_only(&self) -> bool {
        matches!(self, Request::MapProcess { .. } | Request::Enable | Request::Disable)
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
