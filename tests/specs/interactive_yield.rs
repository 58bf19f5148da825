// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: two user-initiated Activities compete for one interactive
//! slot; after the yield timeout the runner yields and the waiter runs.

use serde_json::json;
use std::time::Duration;

use am_core::{ActivityEvent, ActivityState};
use am_daemon::adapters::fake::MemoryStore;

use super::harness::*;

fn interactive_create(name: &str) -> serde_json::Value {
    json!({
        "method": "create",
        "activity": {
            "name": name,
            "type": {"background": true, "userInitiated": true},
            "callback": {"method": "com.test.app/wake"},
        },
        "subscribe": true,
        "start": true,
    })
}

#[tokio::test(start_paused = true)]
async fn waiting_interactive_forces_a_yield() {
    let daemon = Daemon::spawn(MemoryStore::new(), |config| {
        config.background_interactive_concurrency = Some(1);
        config.background_concurrency = Some(1);
    })
    .await;
    let (c1, mut a_events) = client(1, "com.test.app");
    let (c2, mut b_events) = client(2, "com.test.app");

    let reply = rpc(&daemon, &c1, interactive_create("a")).await;
    let a = created_id(&reply);
    assert_eq!(next_event(&mut a_events).await, ActivityEvent::Start);

    let reply = rpc(&daemon, &c2, interactive_create("b")).await;
    let b = created_id(&reply);
    assert_eq!(state_of(&daemon, &c2, b).await, ActivityState::Queued);

    // After the (default 60 s) timeout, A is asked to yield.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(next_event(&mut a_events).await, ActivityEvent::Yield);

    // A's client responds to the yield by letting go; the freed slot goes
    // to B, and A requeues without losing its scheduled position.
    signal(
        &daemon,
        am_daemon::engine::signal::Signal::ConnectionClosed { conn_id: 1 },
    );
    assert_eq!(next_event(&mut b_events).await, ActivityEvent::Start);
    assert_eq!(state_of(&daemon, &c2, b).await, ActivityState::Running);
    assert_eq!(state_of(&daemon, &c2, a).await, ActivityState::Queued);

    daemon.stop().await;
}
