// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: persist → reload. A persistent Activity survives a process
//! restart with the same declarative spec, id, and `(name, creator)` key.

use serde_json::json;

use am_daemon::adapters::fake::MemoryStore;
use am_wire::ReplyBody;

use super::harness::*;

#[tokio::test]
async fn persistent_activity_survives_reboot() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, _events) = client(1, "com.test.backup");

    let reply = rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {
                "name": "nightly",
                "description": "nightly backup",
                "type": {"background": true, "persist": true},
                "callback": {"method": "com.test.backup/run"},
                "schedule": {"start": "2030-01-01 03:00:00", "interval": "1d"},
                "metadata": {"target": "card"},
            },
            "subscribe": true,
        }),
    )
    .await;
    assert!(reply.return_value);
    let id = created_id(&reply);
    assert_eq!(daemon.store.doc_count(), 1);

    let daemon = daemon.reboot().await;
    let (c2, _events) = client(2, "com.test.backup");
    let reply =
        rpc(&daemon, &c2, json!({"method": "getDetails", "activityName": "nightly"})).await;
    let details = match reply.body {
        Some(ReplyBody::Details { activity }) => activity,
        other => panic!("expected details, got {other:?}"),
    };
    assert_eq!(details.activity_id, id);
    assert_eq!(details.creator, am_core::BusId::app("com.test.backup"));
    assert_eq!(details.spec.description, "nightly backup");
    assert_eq!(details.spec.metadata, Some(json!({"target": "card"})));
    assert!(details.spec.schedule.is_some());
    assert!(details.spec.activity_type.persistent);

    daemon.stop().await;
}

#[tokio::test]
async fn completed_activity_is_purged_from_the_store() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, _events) = client(1, "com.test.backup");

    let reply = rpc(
        &daemon,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "once", "type": {"background": true, "persist": true},
                         "callback": {"method": "com.test.backup/run"}},
            "subscribe": true,
        }),
    )
    .await;
    let id = created_id(&reply);
    assert_eq!(daemon.store.doc_count(), 1);

    let reply = rpc(
        &daemon,
        &c1,
        json!({"method": "complete", "activityId": id.value(), "force": true}),
    )
    .await;
    assert!(reply.return_value);
    assert_eq!(daemon.store.doc_count(), 0, "terminal completion deletes the document");

    daemon.stop().await;
}
