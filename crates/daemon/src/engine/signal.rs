// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signals: completions and notifications flowing back into the engine loop.

use serde_json::Value;

use am_core::{ActivityId, CmdId};

use crate::engine::effect::TimerId;
use crate::model::persist::PersistToken;

/// Outcome of a callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Succeeded,
    /// Recoverable transport failure; the Activity requeues.
    Transient,
    /// Unrecoverable failure; the Activity is cancelled.
    Permanent,
}

/// Inputs to the engine loop other than client requests.
#[derive(Debug)]
pub enum Signal {
    /// A trigger subscription produced a response document.
    TriggerResponse { activity_id: ActivityId, response: Value },

    /// A callback invocation finished.
    CallbackResult { activity_id: ActivityId, outcome: CallbackOutcome },

    /// The power daemon confirmed the wake-lock is held.
    PowerLocked { activity_id: ActivityId },

    /// The power daemon confirmed the wake-lock is released.
    PowerUnlocked { activity_id: ActivityId },

    /// A persistence command finished against the store.
    PersistComplete { cmd_id: CmdId, ok: bool, token: Option<PersistToken> },

    /// An armed timer fired.
    TimerFired { id: TimerId },

    /// A requirement provider reported a new value.
    RequirementChanged { name: String, value: Value },

    /// The clock service reported a new local offset (seconds east of UTC).
    TimezoneChanged { offset_secs: i64 },

    /// A client connection went away; its subscriptions are torn down.
    ConnectionClosed { conn_id: u64 },
}
