// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use am_core::{Interval, ScheduleSpec, ScheduleTime};

fn at(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap().and_utc()
}

fn one_shot(start: &str) -> Schedule {
    Schedule::new(ScheduleSpec {
        start: Some(ScheduleTime::parse(start).unwrap()),
        interval: None,
        skip: false,
        local: false,
        end: None,
    })
}

fn recurring(start: Option<&str>, interval: &str, skip: bool, end: Option<&str>) -> Schedule {
    Schedule::new(ScheduleSpec {
        start: start.map(|s| ScheduleTime::parse(s).unwrap()),
        interval: Some(Interval::parse(interval).unwrap()),
        skip,
        local: false,
        end: end.map(|s| ScheduleTime::parse(s).unwrap()),
    })
}

// ── next due computation ─────────────────────────────────────────────────────

#[test]
fn one_shot_future_due_at_start() {
    let mut s = one_shot("2026-03-02 03:00:00");
    s.compute_next_due(at("2026-03-01 00:00:00"), 0);
    assert_eq!(s.next_due(), Some(at("2026-03-02 03:00:00")));
}

#[test]
fn one_shot_past_is_immediately_due() {
    let mut s = one_shot("2026-02-01 00:00:00");
    let now = at("2026-03-01 00:00:00");
    s.compute_next_due(now, 0);
    assert!(s.next_due().unwrap() <= now);
}

#[test]
fn interval_anchored_in_future_waits_for_anchor() {
    let mut s = recurring(Some("2026-03-02 00:00:00"), "1d", false, None);
    s.compute_next_due(at("2026-03-01 00:00:00"), 0);
    assert_eq!(s.next_due(), Some(at("2026-03-02 00:00:00")));
}

#[test]
fn interval_without_skip_runs_missed_firing_immediately() {
    let mut s = recurring(Some("2026-02-01 00:00:00"), "1d", false, None);
    let now = at("2026-03-01 12:00:00");
    s.compute_next_due(now, 0);
    assert_eq!(s.next_due(), Some(now));
}

#[test]
fn interval_with_skip_advances_to_next_grid_point() {
    let mut s = recurring(Some("2026-02-01 00:00:00"), "1d", true, None);
    s.compute_next_due(at("2026-03-01 12:00:00"), 0);
    assert_eq!(s.next_due(), Some(at("2026-03-02 00:00:00")));
}

#[test]
fn end_time_stops_recurrence() {
    let mut s = recurring(
        Some("2026-02-01 00:00:00"),
        "1d",
        true,
        Some("2026-02-15 00:00:00"),
    );
    s.compute_next_due(at("2026-03-01 00:00:00"), 0);
    assert_eq!(s.next_due(), None);
    assert!(!s.should_reschedule());
}

#[test]
fn local_schedule_applies_offset() {
    let mut s = Schedule::new(ScheduleSpec {
        start: Some(ScheduleTime::parse("2026-03-02 03:00:00").unwrap()),
        interval: None,
        skip: false,
        local: true,
        end: None,
    });
    // Two hours east: local 03:00 is 01:00 UTC.
    s.compute_next_due(at("2026-03-01 00:00:00"), 2 * 3600);
    assert_eq!(s.next_due(), Some(at("2026-03-02 01:00:00")));
}

// ── fire / finish lifecycle ──────────────────────────────────────────────────

#[test]
fn fire_latches_due_until_finished() {
    let mut s = one_shot("2026-03-01 00:00:00");
    s.compute_next_due(at("2026-03-01 00:00:00"), 0);
    s.mark_queued();
    assert!(!s.is_due());
    s.fire();
    assert!(s.is_due());
    assert!(!s.is_queued());
    s.inform_finished();
    assert!(!s.is_due());
}

#[test]
fn one_shot_never_reschedules() {
    let s = one_shot("2026-03-01 00:00:00");
    assert!(!s.should_reschedule());
}

#[test]
fn recurring_reschedules_while_next_due_exists() {
    let mut s = recurring(Some("2026-03-01 00:00:00"), "6h", false, None);
    s.compute_next_due(at("2026-03-01 01:00:00"), 0);
    assert!(s.should_reschedule());
}

// ── due-time queue ───────────────────────────────────────────────────────────

#[test]
fn queue_presents_earliest_wake() {
    let mut q = ScheduleQueue::default();
    q.insert(at("2026-03-02 00:00:00"), am_core::ActivityId(1));
    q.insert(at("2026-03-01 12:00:00"), am_core::ActivityId(2));
    assert_eq!(q.next_wake(), Some(at("2026-03-01 12:00:00")));
}

#[test]
fn pop_due_returns_everything_at_or_before_now() {
    let mut q = ScheduleQueue::default();
    q.insert(at("2026-03-01 06:00:00"), am_core::ActivityId(1));
    q.insert(at("2026-03-01 12:00:00"), am_core::ActivityId(2));
    q.insert(at("2026-03-02 00:00:00"), am_core::ActivityId(3));

    let due = q.pop_due(at("2026-03-01 12:00:00"));
    assert_eq!(due, vec![am_core::ActivityId(1), am_core::ActivityId(2)]);
    assert_eq!(q.len(), 1);
}

#[test]
fn remove_unqueues_one_entry() {
    let mut q = ScheduleQueue::default();
    q.insert(at("2026-03-01 06:00:00"), am_core::ActivityId(1));
    q.remove(at("2026-03-01 06:00:00"), am_core::ActivityId(1));
    assert!(q.is_empty());
    assert_eq!(q.next_wake(), None);
}
