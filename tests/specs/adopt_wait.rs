// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: a subscriber queues to adopt, the parent releases, ownership
//! hands over with orphan/adopted notifications.

use serde_json::json;

use am_core::{ActivityEvent, ErrorCode};
use am_daemon::adapters::fake::MemoryStore;

use super::harness::*;

#[tokio::test]
async fn adopt_wait_promotes_on_release() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (creator, mut creator_events) = client(1, "com.test.creator");
    let (adopter, mut adopter_events) = client(2, "com.test.adopter");

    let reply = rpc(
        &daemon,
        &creator,
        json!({
            "method": "create",
            "activity": {"name": "handoff", "type": {"foreground": true},
                         "callback": {"method": "com.test.creator/wake"}},
            "subscribe": true,
            "start": true,
        }),
    )
    .await;
    let id = created_id(&reply);
    assert_eq!(next_event(&mut creator_events).await, ActivityEvent::Start);

    // Willing to wait: queued, not adopted yet.
    let reply = rpc(
        &daemon,
        &adopter,
        json!({"method": "adopt", "activityId": id.value(), "wait": true, "subscribe": true}),
    )
    .await;
    match reply.body {
        Some(am_wire::ReplyBody::Adopted { adopted, .. }) => assert!(!adopted),
        other => panic!("expected adopted reply, got {other:?}"),
    }

    let reply =
        rpc(&daemon, &creator, json!({"method": "release", "activityId": id.value()})).await;
    assert!(reply.return_value);

    // The new parent hears orphan; the released parent hears adopted.
    assert_eq!(next_event(&mut adopter_events).await, ActivityEvent::Orphan);
    assert_eq!(next_event(&mut creator_events).await, ActivityEvent::Adopted);

    daemon.stop().await;
}

#[tokio::test]
async fn adopt_without_wait_would_block() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (creator, _creator_events) = client(1, "com.test.creator");
    let (adopter, _adopter_events) = client(2, "com.test.adopter");

    let reply = rpc(
        &daemon,
        &creator,
        json!({"method": "create", "activity": {"name": "held"}, "subscribe": true}),
    )
    .await;
    let id = created_id(&reply);

    let reply = rpc(
        &daemon,
        &adopter,
        json!({"method": "adopt", "activityId": id.value(), "subscribe": true}),
    )
    .await;
    assert_eq!(reply.error_code, Some(ErrorCode::WouldBlock));

    daemon.stop().await;
}

#[tokio::test]
async fn release_by_non_parent_is_rejected() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (creator, _creator_events) = client(1, "com.test.creator");
    let (stranger, _stranger_events) = client(2, "com.test.stranger");

    let reply = rpc(
        &daemon,
        &creator,
        json!({"method": "create", "activity": {"name": "mine"}, "subscribe": true}),
    )
    .await;
    let id = created_id(&reply);

    let reply =
        rpc(&daemon, &stranger, json!({"method": "release", "activityId": id.value()})).await;
    assert_eq!(reply.error_code, Some(ErrorCode::WrongCaller));

    daemon.stop().await;
}
