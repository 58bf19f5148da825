// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule state and the due-time queue.
//!
//! All internal scheduling runs in UTC. Local-time entries apply the current
//! device offset when their due time is computed, so a timezone change only
//! requires recomputing due times, not rewriting specs.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use am_core::{ActivityId, ScheduleSpec};

/// Per-Activity schedule state.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub spec: ScheduleSpec,
    queued: bool,
    due: bool,
    next_due: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(spec: ScheduleSpec) -> Self {
        Self { spec, queued: false, due: false, next_due: None }
    }

    /// Compute the next due time at or after `now`.
    ///
    /// One-shot schedules in the past are immediately due. Recurring
    /// schedules fire on the grid anchored at `start` (or at `now` when no
    /// anchor is given); with `skip`, missed firings collapse into the next
    /// future grid point.
    pub fn compute_next_due(&mut self, now: DateTime<Utc>, offset_secs: i64) {
        let offset = if self.spec.local { offset_secs } else { 0 };
        let anchor = self.spec.start.map(|t| t.to_utc(offset));
        let next = match (&self.spec.interval, anchor) {
            (None, Some(start)) => Some(start),
            (Some(interval), anchor) => {
                let anchor = anchor.unwrap_or(now);
                let step = interval.as_chrono();
                if anchor > now {
                    Some(anchor)
                } else if self.spec.skip {
                    // Advance to the first grid point after now.
                    let elapsed = now - anchor;
                    let steps = elapsed.num_seconds() / step.num_seconds().max(1) + 1;
                    Some(anchor + step * steps as i32)
                } else {
                    // Late firings run immediately.
                    Some(now)
                }
            }
            (None, None) => None,
        };
        let end = self.spec.end.map(|t| t.to_utc(offset));
        self.next_due = match (next, end) {
            (Some(n), Some(e)) if n > e => None,
            (next, _) => next,
        };
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Due gates `isRunnable`; absent schedule counts as due at the caller.
    pub fn is_due(&self) -> bool {
        self.due
    }

    pub fn mark_queued(&mut self) {
        self.queued = true;
    }

    pub fn mark_unqueued(&mut self) {
        self.queued = false;
    }

    pub fn fire(&mut self) {
        self.queued = false;
        self.due = true;
    }

    /// Called when the Activity finishes a run; clears the due latch so a
    /// restart waits for the next occurrence.
    pub fn inform_finished(&mut self) {
        self.due = false;
    }

    /// Whether the schedule wants the Activity to run again.
    pub fn should_reschedule(&self) -> bool {
        self.spec.is_recurring() && self.next_due.is_some()
    }
}

/// The manager-level due-time queue: a sorted set presenting one next wake
/// time to the external timer.
#[derive(Debug, Default)]
pub struct ScheduleQueue {
    entries: BTreeSet<(DateTime<Utc>, ActivityId)>,
}

impl ScheduleQueue {
    pub fn insert(&mut self, due: DateTime<Utc>, id: ActivityId) {
        self.entries.insert((due, id));
    }

    pub fn remove(&mut self, due: DateTime<Utc>, id: ActivityId) {
        self.entries.remove(&(due, id));
    }

    /// The single wake time presented to the timer source.
    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().next().map(|(t, _)| *t)
    }

    /// Pop every entry due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<ActivityId> {
        let mut due = Vec::new();
        while let Some(&(t, id)) = self.entries.iter().next() {
            if t > now {
                break;
            }
            self.entries.remove(&(t, id));
            due.push(id);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
