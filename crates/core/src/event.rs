// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events delivered to Activity subscribers.

use serde::{Deserialize, Serialize};

/// Events broadcast on an Activity's subscriptions.
///
/// Command events (`start`..`cancel`) mirror the announced command word.
/// `update` is only delivered to subscriptions that asked for detailed
/// events, and consecutive duplicates are suppressed per subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityEvent {
    Start,
    Stop,
    Pause,
    Cancel,
    Complete,
    Yield,
    Orphan,
    Adopted,
    Update,
    Focus,
    Unfocus,
}

crate::simple_display! {
    ActivityEvent {
        Start => "start",
        Stop => "stop",
        Pause => "pause",
        Cancel => "cancel",
        Complete => "complete",
        Yield => "yield",
        Orphan => "orphan",
        Adopted => "adopted",
        Update => "update",
        Focus => "focus",
        Unfocus => "unfocus",
    }
}

impl ActivityEvent {
    /// Update events are the only ones filtered by the detailed-events flag.
    pub fn is_detail_only(&self) -> bool {
        matches!(self, ActivityEvent::Update)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
