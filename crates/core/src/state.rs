// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-visible Activity states.
//!
//! The state is computed from the internal lifecycle flags and the last
//! command actually announced; it is never stored.

use serde::{Deserialize, Serialize};

/// Computed lifecycle state, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    /// Not yet told to schedule.
    Init,
    /// Scheduled but missing trigger, schedule, or start command.
    Waiting,
    /// Scheduled and triggered but some requirement unmet.
    Blocked,
    /// Ready, awaiting a scheduler slot.
    Queued,
    /// Permitted to run but `start` not yet broadcast.
    Starting,
    /// `start` broadcast.
    Running,
    /// Last announced external command was `pause`.
    Paused,
    /// Ending on `complete`, subscribers remain.
    Completing,
    Complete,
    /// Ending on `stop`, subscribers remain.
    Stopping,
    Stopped,
    /// Ending on `cancel`, subscribers remain.
    Cancelling,
    Cancelled,
}

crate::simple_display! {
    ActivityState {
        Init => "init",
        Waiting => "waiting",
        Blocked => "blocked",
        Queued => "queued",
        Starting => "starting",
        Running => "running",
        Paused => "paused",
        Completing => "completing",
        Complete => "complete",
        Stopping => "stopping",
        Stopped => "stopped",
        Cancelling => "cancelling",
        Cancelled => "cancelled",
    }
}

impl ActivityState {
    /// Terminal states: the Activity is gone once its last reference drops.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Stopped | Self::Cancelled)
    }
}
