// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: create a foreground Activity with a callback, watch it run,
//! complete it.

use serde_json::json;

use am_core::{ActivityEvent, ActivityState};
use am_daemon::adapters::fake::MemoryStore;

use super::harness::*;

#[tokio::test]
async fn create_run_complete() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, mut events) = client(1, "com.test.mail");

    let reply = rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {
                "name": "s",
                "type": {"foreground": true},
                "callback": {"method": "com.test.mail/wake"},
            },
            "subscribe": true,
            "start": true,
        }),
    )
    .await;
    assert!(reply.return_value);
    let id = created_id(&reply);

    // A single start event arrives on the creator's subscription.
    assert_eq!(next_event(&mut events).await, ActivityEvent::Start);
    expect_quiet(&mut events).await;
    assert_eq!(state_of(&daemon, &c1, id).await, ActivityState::Running);

    // The callback was invoked with the activity handle attached.
    let invocations = daemon.callbacks.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].1, "com.test.mail/wake");
    assert_eq!(invocations[0].2["$activity"]["activityId"], id.value());

    let reply =
        rpc(&daemon, &c1, json!({"method": "complete", "activityId": id.value()})).await;
    assert!(reply.return_value);
    assert_eq!(next_event(&mut events).await, ActivityEvent::Complete);

    daemon.stop().await;
}

#[tokio::test]
async fn idempotent_start_produces_no_second_event() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, mut events) = client(1, "com.test.mail");

    let reply = rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "s", "type": {"foreground": true},
                         "callback": {"method": "com.test.mail/wake"}},
            "subscribe": true,
            "start": true,
        }),
    )
    .await;
    let id = created_id(&reply);
    assert_eq!(next_event(&mut events).await, ActivityEvent::Start);

    let reply = rpc(&daemon, &c1, json!({"method": "start", "activityId": id.value()})).await;
    assert!(reply.return_value);
    expect_quiet(&mut events).await;

    daemon.stop().await;
}
