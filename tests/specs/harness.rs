// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spec harness: a spawned engine with fake adapters and channel clients.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use am_core::{ActivityEvent, BusId, BusType, FakeClock};
use am_daemon::adapters::fake::{
    FakeCallbackSink, FakeContainerSink, FakePowerAdapter, FakeTriggerSource, MemoryStore,
};
use am_daemon::engine::executor::EngineDeps;
use am_daemon::engine::signal::Signal;
use am_daemon::model::registry::IdAllocation;
use am_daemon::model::ENABLE_MASK;
use am_daemon::{ConnCtx, Engine, EngineConfig, EngineHandle, Msg};
use am_wire::{EventRecord, Reply, ReplyBody, Request};

pub struct Daemon {
    pub handle: EngineHandle,
    pub store: MemoryStore,
    pub power: FakePowerAdapter,
    pub callbacks: FakeCallbackSink,
    pub triggers: FakeTriggerSource,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Daemon {
    /// Spawn an engine with every gate open and stock policy, tweaked by
    /// `configure`. With `reload`, the store's documents run through the
    /// boot loader first, exactly as daemon startup does.
    pub async fn spawn_inner(
        store: MemoryStore,
        reload: bool,
        configure: impl FnOnce(&mut EngineConfig),
    ) -> Self {
        let power = FakePowerAdapter::auto_confirm();
        let callbacks = FakeCallbackSink::default();
        let triggers = FakeTriggerSource::default();
        let deps = EngineDeps {
            power: Arc::new(power.clone()),
            store: Arc::new(store.clone()),
            triggers: Arc::new(triggers.clone()),
            callbacks: Arc::new(callbacks.clone()),
            containers: Arc::new(FakeContainerSink::default()),
        };
        let mut config =
            EngineConfig { allocation: IdAllocation::Monotonic, ..EngineConfig::default() };
        configure(&mut config);
        let clock = FakeClock::new();
        let (mut engine, handle) = Engine::new(deps, config, clock.clone());
        engine.state_mut().enabled = ENABLE_MASK;
        engine.state_mut().requirements.register("internet", json!(false));

        if reload {
            use am_core::Clock;
            let mut fx = am_daemon::engine::effect::Fx::new();
            am_daemon::lifecycle::load_persisted(
                engine.state_mut(),
                store.docs(),
                clock.utc_now(),
                &mut fx,
            );
            engine.flush_startup_effects(fx.drain()).await;
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));
        Self { handle, store, power, callbacks, triggers, shutdown, task }
    }

    pub async fn spawn(store: MemoryStore, configure: impl FnOnce(&mut EngineConfig)) -> Self {
        Self::spawn_inner(store, false, configure).await
    }

    /// Stop this engine and start a fresh one over the same store,
    /// reloading persisted Activities.
    pub async fn reboot(self) -> Self {
        let store = self.store.clone();
        self.stop().await;
        Self::spawn_inner(store, true, |_| {}).await
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

/// Build a connection context plus its event stream.
pub fn client(conn_id: u64, caller: &str) -> (ConnCtx, mpsc::UnboundedReceiver<EventRecord>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ConnCtx { conn_id, caller: BusId::app(caller), bus: BusType::Private, outlet: tx },
        rx,
    )
}

/// Issue one request and await its reply.
pub async fn rpc(daemon: &Daemon, ctx: &ConnCtx, raw: serde_json::Value) -> Reply {
    let request: Request = serde_json::from_value(raw).expect("well-formed request");
    let (tx, rx) = oneshot::channel();
    daemon
        .handle
        .msg_tx
        .send(Msg::Rpc { ctx: ctx.clone(), request, reply: tx })
        .await
        .expect("engine alive");
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("reply within deadline")
        .expect("reply delivered")
}

/// Push an adapter-side signal into the engine.
pub fn signal(daemon: &Daemon, signal: Signal) {
    daemon.handle.signal_tx.send(signal).expect("engine alive");
}

pub fn created_id(reply: &Reply) -> am_core::ActivityId {
    match &reply.body {
        Some(ReplyBody::Created { activity_id }) => *activity_id,
        other => panic!("expected created reply, got {other:?}"),
    }
}

/// Await the next delivered event, with a deadline.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<EventRecord>) -> ActivityEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within deadline")
        .expect("stream open")
        .event
}

/// Assert no event is delivered within a short window.
pub async fn expect_quiet(rx: &mut mpsc::UnboundedReceiver<EventRecord>) {
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err(), "expected no event");
}

/// Fetch the computed state via `monitor`.
pub async fn state_of(
    daemon: &Daemon,
    ctx: &ConnCtx,
    id: am_core::ActivityId,
) -> am_core::ActivityState {
    let reply = rpc(daemon, ctx, json!({"method": "monitor", "activityId": id.value()})).await;
    match reply.body {
        Some(ReplyBody::State { state, .. }) => state,
        other => panic!("expected state reply, got {other:?}"),
    }
}
