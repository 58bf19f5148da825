// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription event records.

use serde::{Deserialize, Serialize};

use am_core::{ActivityEvent, ActivityId};

use crate::types::ActivityDetails;

/// One record on a subscription's event stream.
///
/// `returnValue` is always true on event records; errors terminate the
/// subscription instead of travelling on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: ActivityEvent,
    #[serde(rename = "activityId")]
    pub activity_id: ActivityId,
    #[serde(rename = "returnValue")]
    pub return_value: bool,
    /// Full details, attached for detailed-events subscribers.
    #[serde(rename = "$activity", default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Box<ActivityDetails>>,
}

impl EventRecord {
    pub fn new(event: ActivityEvent, activity_id: ActivityId) -> Self {
        Self { event, activity_id, return_value: true, activity: None }
    }

    pub fn with_details(mut self, details: ActivityDetails) -> Self {
        self.activity = Some(Box::new(details));
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
