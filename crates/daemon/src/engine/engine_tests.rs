// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::fake::{
    FakeCallbackSink, FakeContainerSink, FakePowerAdapter, FakeTriggerSource, MemoryStore,
};
use crate::model::registry::IdAllocation;
use am_core::{ActivityEvent, FakeClock};
use am_wire::{ActivityRef, EventRecord, ReplyBody};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

struct Harness {
    engine: Engine<FakeClock>,
    store: MemoryStore,
    callbacks: FakeCallbackSink,
    power: FakePowerAdapter,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let callbacks = FakeCallbackSink::default();
    let power = FakePowerAdapter::auto_confirm();
    let deps = executor::EngineDeps {
        power: Arc::new(power.clone()),
        store: Arc::new(store.clone()),
        triggers: Arc::new(FakeTriggerSource::default()),
        callbacks: Arc::new(callbacks.clone()),
        containers: Arc::new(FakeContainerSink::default()),
    };
    let config = crate::model::EngineConfig {
        allocation: IdAllocation::Monotonic,
        ..crate::model::EngineConfig::default()
    };
    let (mut engine, _handle) = Engine::new(deps, config, FakeClock::new());
    engine.state_mut().enabled = crate::model::ENABLE_MASK;
    engine.state_mut().requirements.register("internet", json!(false));
    Harness { engine, store, callbacks, power }
}

struct Client {
    ctx: ConnCtx,
    events: mpsc::UnboundedReceiver<EventRecord>,
}

fn client(conn_id: u64, caller: &str) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    Client {
        ctx: ConnCtx {
            conn_id,
            caller: BusId::app(caller),
            bus: BusType::Private,
            outlet: tx,
        },
        events: rx,
    }
}

async fn rpc(
    harness: &mut Harness,
    client: &Client,
    raw: serde_json::Value,
) -> oneshot::Receiver<Reply> {
    let request: Request = serde_json::from_value(raw).unwrap();
    let (tx, rx) = oneshot::channel();
    harness
        .engine
        .dispatch(Msg::Rpc { ctx: client.ctx.clone(), request, reply: tx })
        .await;
    rx
}

/// Let spawned adapter tasks run, then feed their signals back into the
/// engine until everything is quiet.
async fn settle(harness: &mut Harness) {
    for _ in 0..8 {
        tokio::task::yield_now().await;
        while let Ok(signal) = harness.engine.signal_rx.try_recv() {
            let now = harness.engine.clock.utc_now();
            let mut fx = effect::Fx::new();
            harness.engine.handle_signal(signal, now, &mut fx);
            let effects = fx.drain();
            harness.engine.executor.execute_all(effects).await;
        }
    }
}

fn events(client: &mut Client) -> Vec<ActivityEvent> {
    let mut out = Vec::new();
    while let Ok(record) = client.events.try_recv() {
        out.push(record.event);
    }
    out
}

// ── end to end through the loop ──────────────────────────────────────────────

#[tokio::test]
async fn create_run_complete_round_trip() {
    let mut harness = harness();
    let mut c1 = client(1, "com.test.app");

    let reply = rpc(
        &mut harness,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "s", "type": {"foreground": true},
                         "callback": {"method": "com.test.app/run"}},
            "subscribe": true, "start": true,
        }),
    )
    .await;
    let reply = reply.await.unwrap();
    assert!(reply.return_value);
    let id = match reply.body {
        Some(ReplyBody::Created { activity_id }) => activity_id,
        other => panic!("expected created, got {other:?}"),
    };
    settle(&mut harness).await;
    assert_eq!(events(&mut c1), vec![ActivityEvent::Start]);
    assert_eq!(harness.callbacks.invocations().len(), 1);

    let reply = rpc(&mut harness, &c1, json!({"method": "complete", "activityId": id.value()}))
        .await
        .await
        .unwrap();
    assert!(reply.return_value);
    assert_eq!(events(&mut c1), vec![ActivityEvent::Complete]);
}

#[tokio::test]
async fn persistent_create_stores_a_document() {
    let mut harness = harness();
    let c1 = client(1, "com.test.app");

    let reply = rpc(
        &mut harness,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "durable", "type": {"background": true, "persist": true}},
            "subscribe": true,
        }),
    )
    .await;
    // The reply gates on the store ack, which arrives as a signal.
    settle(&mut harness).await;
    let reply = reply.await.unwrap();
    assert!(reply.return_value);
    assert_eq!(harness.store.doc_count(), 1);
    let (_, rev, doc) = harness.store.docs().pop().unwrap();
    assert_eq!(rev, 1);
    assert_eq!(doc["name"], "durable");
    assert_eq!(doc["creator"], "app:com.test.app");
}

#[tokio::test]
async fn power_locked_activity_starts_after_confirmation() {
    let mut harness = harness();
    let mut c1 = client(1, "com.test.app");

    let reply = rpc(
        &mut harness,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "p", "type": {"foreground": true, "power": true},
                         "callback": {"method": "com.test.app/run"}},
            "subscribe": true, "start": true,
        }),
    )
    .await;
    reply.await.unwrap();
    assert_eq!(harness.power.begin_count(), 1);
    // Start is broadcast only once the lock confirmation lands.
    assert!(events(&mut c1).is_empty());
    settle(&mut harness).await;
    assert_eq!(events(&mut c1), vec![ActivityEvent::Start]);
}

#[tokio::test]
async fn connection_close_tears_down_subscriptions() {
    let mut harness = harness();
    let c1 = client(1, "com.test.app");

    let reply = rpc(
        &mut harness,
        &c1,
        json!({"method": "create", "activity": {"name": "gone"}, "subscribe": true}),
    )
    .await
    .await
    .unwrap();
    let id = match reply.body {
        Some(ReplyBody::Created { activity_id }) => activity_id,
        other => panic!("expected created, got {other:?}"),
    };
    assert!(harness.engine.state().registry.get(id).is_some());

    harness.engine.dispatch(Msg::Signal(Signal::ConnectionClosed { conn_id: 1 })).await;
    // Sole subscriber (the parent) gone: the Activity is abandoned and released.
    assert!(harness.engine.state().registry.get(id).is_none());
}

#[tokio::test]
async fn requirement_signal_unblocks_activities() {
    let mut harness = harness();
    let c1 = client(1, "com.test.app");

    let reply = rpc(
        &mut harness,
        &c1,
        json!({
            "method": "create",
            "activity": {"name": "netbound", "type": {"foreground": true},
                         "callback": {"method": "com.test.app/run"},
                         "requirements": {"internet": true}},
            "subscribe": true, "start": true,
        }),
    )
    .await;
    let reply = reply.await.unwrap();
    let id = match reply.body {
        Some(ReplyBody::Created { activity_id }) => activity_id,
        other => panic!("expected created, got {other:?}"),
    };
    assert_eq!(
        harness.engine.state().registry.get(id).unwrap().state(),
        am_core::ActivityState::Blocked
    );

    harness
        .engine
        .dispatch(Msg::Signal(Signal::RequirementChanged {
            name: "internet".into(),
            value: json!(true),
        }))
        .await;
    assert!(harness.engine.state().registry.get(id).unwrap().is_running());
}

// ── monitor by reference ─────────────────────────────────────────────────────

#[tokio::test]
async fn monitor_by_name_after_create() {
    let mut harness = harness();
    let c1 = client(1, "com.test.app");
    rpc(
        &mut harness,
        &c1,
        json!({"method": "create", "activity": {"name": "watch"}, "subscribe": true}),
    )
    .await
    .await
    .unwrap();

    let request = Request::Monitor {
        target: ActivityRef::by_name("watch"),
        subscribe: false,
        detailed_events: false,
    };
    let (tx, rx) = oneshot::channel();
    harness
        .engine
        .dispatch(Msg::Rpc { ctx: c1.ctx.clone(), request, reply: tx })
        .await;
    let reply = rx.await.unwrap();
    assert!(matches!(reply.body, Some(ReplyBody::State { .. })));
}
