// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity commands and the command-merging lattice.
//!
//! An Activity tracks the last internal intent and the last external intent
//! separately; what gets announced to subscribers is the dominant of the two.

use serde::{Deserialize, Serialize};

use crate::event::ActivityEvent;

/// Commands that drive the Activity lifecycle.
///
/// Variant order IS the dominance order used by [`ActivityCommand::merge`]:
/// `cancel > stop > complete > pause > start > none`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCommand {
    #[default]
    None,
    Start,
    Pause,
    Complete,
    Stop,
    Cancel,
}

crate::simple_display! {
    ActivityCommand {
        None => "none",
        Start => "start",
        Pause => "pause",
        Complete => "complete",
        Stop => "stop",
        Cancel => "cancel",
    }
}

impl ActivityCommand {
    /// The dominant of two intents. This is what `computeNext` announces.
    pub fn merge(self, other: ActivityCommand) -> ActivityCommand {
        self.max(other)
    }

    /// True for commands that put the Activity on the ending path.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityCommand::Complete | ActivityCommand::Stop | ActivityCommand::Cancel)
    }

    /// The lifecycle event broadcast when this command is announced.
    /// `None` announces nothing.
    pub fn as_event(&self) -> Option<ActivityEvent> {
        match self {
            ActivityCommand::None => None,
            ActivityCommand::Start => Some(ActivityEvent::Start),
            ActivityCommand::Pause => Some(ActivityEvent::Pause),
            ActivityCommand::Complete => Some(ActivityEvent::Complete),
            ActivityCommand::Stop => Some(ActivityEvent::Stop),
            ActivityCommand::Cancel => Some(ActivityEvent::Cancel),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
