// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenarios: the replace race against an in-flight create, and the
//! crash-consistency of the store during a replace.

use serde_json::json;

use am_core::ActivityEvent;
use am_daemon::adapters::fake::MemoryStore;
use am_daemon::adapters::TransportError;

use super::harness::*;

fn persistent_create(name: &str) -> serde_json::Value {
    json!({
        "method": "create",
        "activity": {
            "name": name,
            "type": {"background": true, "persist": true},
            "callback": {"method": "com.test.app/wake"},
        },
        "subscribe": true,
    })
}

#[tokio::test]
async fn replace_cancels_old_and_survives_reboot() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, mut c1_events) = client(1, "com.test.app");
    let (c2, _c2_events) = client(2, "com.test.app");

    let reply = rpc(&daemon, &c1, persistent_create("k")).await;
    let old_id = created_id(&reply);

    let mut replace = persistent_create("k");
    replace["replace"] = json!(true);
    let reply = rpc(&daemon, &c2, replace).await;
    let new_id = created_id(&reply);
    assert_ne!(old_id, new_id);

    // The old Activity's subscriber hears the cancel.
    assert_eq!(next_event(&mut c1_events).await, ActivityEvent::Cancel);

    // Only one document for the name remains durable.
    let docs = daemon.store.docs();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].2["activityId"].as_u64(), Some(new_id.value()));

    // Reload after reboot sees only the replacement.
    let daemon = daemon.reboot().await;
    let (c3, _events) = client(3, "com.test.app");
    let reply = rpc(&daemon, &c3, json!({"method": "list", "details": true})).await;
    let activities = match reply.body {
        Some(am_wire::ReplyBody::List { activities }) => activities,
        other => panic!("expected list, got {other:?}"),
    };
    let named: Vec<_> = activities.iter().filter(|a| a.spec.name == "k").collect();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].activity_id, new_id);

    daemon.stop().await;
}

#[tokio::test]
async fn failed_replacement_store_never_leaves_both_documents() {
    let daemon = Daemon::spawn(MemoryStore::new(), |_| {}).await;
    let (c1, _c1_events) = client(1, "com.test.app");
    let (c2, _c2_events) = client(2, "com.test.app");

    let reply = rpc(&daemon, &c1, persistent_create("k")).await;
    let old_id = created_id(&reply);
    assert_eq!(daemon.store.doc_count(), 1);

    // The replacement's store is refused; the chain still completes with
    // ok=false and the durable state keeps exactly one owner for the name.
    daemon.store.fail_next(TransportError::Permanent("refused".into()));
    let mut replace = persistent_create("k");
    replace["replace"] = json!(true);
    let reply = rpc(&daemon, &c2, replace).await;
    assert!(reply.return_value);

    let docs = daemon.store.docs();
    assert_eq!(docs.len(), 1, "never both old and new");
    assert_eq!(docs[0].2["activityId"].as_u64(), Some(old_id.value()));

    daemon.stop().await;
}
