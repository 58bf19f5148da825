// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: an Activity gated on `internet` blocks, runs when the provider
//! reports connectivity, and stays running when it drops — a detailed
//! subscriber just sees an update.

use serde_json::json;

use am_core::{ActivityEvent, ActivityState};
use am_daemon::adapters::fake::MemoryStore;
use am_daemon::engine::signal::Signal;

use super::harness::*;

#[tokio::test]
async fn requirement_gates_and_updates() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, mut events) = client(1, "com.test.mail");

    let reply = rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {
                "name": "sync",
                "type": {"foreground": true},
                "callback": {"method": "com.test.mail/sync"},
                "requirements": {"internet": true},
            },
            "subscribe": true,
            "detailedEvents": true,
            "start": true,
        }),
    )
    .await;
    let id = created_id(&reply);

    // Internet absent: blocked, and the creator was told why.
    assert_eq!(state_of(&daemon, &c1, id).await, ActivityState::Blocked);
    assert_eq!(next_event(&mut events).await, ActivityEvent::Update);

    // Provider reports connected: the Activity runs. The met-transition
    // update collapses into the previous one (consecutive duplicates are
    // suppressed), so the next thing heard is the start.
    signal(&daemon, Signal::RequirementChanged { name: "internet".into(), value: json!(true) });
    assert_eq!(next_event(&mut events).await, ActivityEvent::Start);
    assert_eq!(state_of(&daemon, &c1, id).await, ActivityState::Running);

    // Provider reports disconnected while running: no implicit transition,
    // only an update for the detailed subscriber.
    signal(&daemon, Signal::RequirementChanged { name: "internet".into(), value: json!(false) });
    assert_eq!(next_event(&mut events).await, ActivityEvent::Update);
    expect_quiet(&mut events).await;
    assert_eq!(state_of(&daemon, &c1, id).await, ActivityState::Running);

    daemon.stop().await;
}

#[tokio::test]
async fn non_detailed_subscriber_sees_no_updates() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, mut events) = client(1, "com.test.mail");

    rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {
                "name": "sync",
                "type": {"foreground": true},
                "callback": {"method": "com.test.mail/sync"},
                "requirements": {"internet": true},
            },
            "subscribe": true,
            "start": true,
        }),
    )
    .await;

    signal(&daemon, Signal::RequirementChanged { name: "internet".into(), value: json!(true) });
    // Only the start crosses; update events are filtered out.
    assert_eq!(next_event(&mut events).await, ActivityEvent::Start);
    expect_quiet(&mut events).await;

    daemon.stop().await;
}

#[tokio::test]
async fn unknown_requirement_is_rejected_at_create() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, _events) = client(1, "com.test.mail");

    let reply = rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "x", "requirements": {"teleport": true}},
            "subscribe": true,
        }),
    )
    .await;
    assert_eq!(reply.error_code, Some(am_core::ErrorCode::UnknownRequirement));

    daemon.stop().await;
}
