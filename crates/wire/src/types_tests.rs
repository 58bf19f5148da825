// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use am_core::test_support;
use serde_json::json;

fn details(id: u64, name: &str) -> ActivityDetails {
    ActivityDetails {
        activity_id: ActivityId(id),
        creator: BusId::app("com.example.mail"),
        state: ActivityState::Waiting,
        focused: false,
        spec: test_support::callback_spec(name),
        subscribers: None,
        current: None,
        internal: None,
    }
}

#[test]
fn details_flatten_spec_fields() {
    let v = serde_json::to_value(details(42, "sync-mail")).unwrap();
    assert_eq!(v["activityId"], 42);
    assert_eq!(v["name"], "sync-mail");
    assert_eq!(v["state"], "waiting");
    // optional sections absent when not requested
    assert!(v.get("subscribers").is_none());
    assert!(v.get("internal").is_none());
}

#[test]
fn details_round_trip() {
    let mut d = details(7, "backup");
    d.subscribers = Some(vec![BusId::service("com.example.backupd")]);
    let v = serde_json::to_value(&d).unwrap();
    let back: ActivityDetails = serde_json::from_value(v).unwrap();
    assert_eq!(back, d);
}

#[test]
fn manager_info_serializes_queue_sections() {
    let info = ManagerInfo {
        enabled: vec!["ui".into(), "configurationLoaded".into()],
        background_concurrency: Some(1),
        background_interactive_concurrency: Some(2),
        yield_timeout_seconds: 60,
        queues: vec![QueueInfo { name: "ready".into(), activities: vec![ActivityId(1)] }],
        containers: json!(null),
    };
    let v = serde_json::to_value(&info).unwrap();
    assert_eq!(v["queues"][0]["name"], "ready");
    assert_eq!(v["backgroundConcurrency"], 1);
    assert!(v.get("containers").is_none());
}
