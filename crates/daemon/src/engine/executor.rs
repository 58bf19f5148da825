// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor.
//!
//! Performs effects against the adapters. Long out-calls run in spawned
//! tasks and report back through the signal channel; the engine loop never
//! blocks on an adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::adapters::{
    CallbackSink, ContainerSink, PersistStore, PowerAdapter, SignalSender, TransportError,
    TriggerSource,
};
use crate::engine::effect::{Effect, StoreOp, TimerId};
use crate::engine::signal::{CallbackOutcome, Signal};

/// Initial backoff for transient store failures.
const PERSIST_RETRY_BASE: Duration = Duration::from_millis(100);
/// Backoff ceiling; retries continue at this pace until they succeed or the
/// failure turns permanent.
const PERSIST_RETRY_MAX: Duration = Duration::from_secs(30);

/// Adapter bundle the executor drives.
pub struct EngineDeps {
    pub power: Arc<dyn PowerAdapter>,
    pub store: Arc<dyn PersistStore>,
    pub triggers: Arc<dyn TriggerSource>,
    pub callbacks: Arc<dyn CallbackSink>,
    pub containers: Arc<dyn ContainerSink>,
}

/// Executes effects using the configured adapters.
pub struct Executor {
    deps: EngineDeps,
    signals: SignalSender,
    timers: Mutex<HashMap<TimerId, CancellationToken>>,
}

impl Executor {
    pub fn new(deps: EngineDeps, signals: SignalSender) -> Self {
        Self { deps, signals, timers: Mutex::new(HashMap::new()) }
    }

    /// Execute a batch of effects in order.
    pub async fn execute_all(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect).await;
        }
    }

    /// Execute a single effect with tracing.
    pub async fn execute(&self, effect: Effect) {
        if effect.verbose() {
            tracing::debug!(effect = effect.name(), "executing effect");
        }
        match effect {
            Effect::TriggerSubscribe { activity_id, method, params } => {
                self.deps.triggers.subscribe(activity_id, method, params, self.signals.clone()).await;
            }
            Effect::TriggerCancel { activity_id } => {
                self.deps.triggers.cancel(activity_id).await;
            }
            Effect::InvokeCallback { activity_id, method, params } => {
                let callbacks = Arc::clone(&self.deps.callbacks);
                let signals = self.signals.clone();
                tokio::spawn(async move {
                    let outcome = match callbacks.invoke(activity_id, method, params).await {
                        Ok(()) => CallbackOutcome::Succeeded,
                        Err(TransportError::Transient(err)) => {
                            tracing::warn!(activity = %activity_id, error = %err, "callback transient failure");
                            CallbackOutcome::Transient
                        }
                        Err(TransportError::Permanent(err)) => {
                            tracing::warn!(activity = %activity_id, error = %err, "callback permanent failure");
                            CallbackOutcome::Permanent
                        }
                    };
                    let _ = signals.send(Signal::CallbackResult { activity_id, outcome });
                });
            }
            Effect::PowerBegin { activity_id } => {
                self.deps.power.request_begin(activity_id, self.signals.clone()).await;
            }
            Effect::PowerEnd { activity_id, debounce } => {
                self.deps.power.request_end(activity_id, debounce, self.signals.clone()).await;
            }
            Effect::PersistDispatch { cmd_id, op } => {
                let store = Arc::clone(&self.deps.store);
                let signals = self.signals.clone();
                tokio::spawn(async move {
                    let signal = run_store_op(store, cmd_id, op).await;
                    let _ = signals.send(signal);
                });
            }
            Effect::SetTimer { id, delay } => self.set_timer(id, delay),
            Effect::CancelTimer { id } => self.cancel_timer(id),
            Effect::ContainerApply { container, priority, focused } => {
                self.deps.containers.apply(&container, priority, focused);
            }
            Effect::ContainerMapPid { container, pid } => {
                self.deps.containers.map_pid(&container, pid);
            }
        }
    }

    /// Arm a timer, replacing any previous one under the same id.
    fn set_timer(&self, id: TimerId, delay: Duration) {
        let token = CancellationToken::new();
        if let Some(previous) = self.timers.lock().insert(id, token.clone()) {
            previous.cancel();
        }
        let signals = self.signals.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = signals.send(Signal::TimerFired { id });
                }
            }
        });
    }

    fn cancel_timer(&self, id: TimerId) {
        if let Some(token) = self.timers.lock().remove(&id) {
            token.cancel();
        }
    }
}

/// Run one store operation with capped exponential backoff on transient
/// failures. Permanent failures complete the command with `ok = false`.
async fn run_store_op(store: Arc<dyn PersistStore>, cmd_id: am_core::CmdId, op: StoreOp) -> Signal {
    let mut backoff = PERSIST_RETRY_BASE;
    loop {
        let result = match op.clone() {
            StoreOp::Put { doc_id, rev, doc } => {
                store.put(doc_id, rev, doc).await.map(Some)
            }
            StoreOp::Del { doc_id, rev } => store.del(doc_id, rev).await.map(|()| None),
        };
        match result {
            Ok(token) => {
                let token = token.map(|(doc_id, rev)| crate::model::persist::PersistToken {
                    doc_id: Some(doc_id),
                    rev: Some(rev),
                });
                return Signal::PersistComplete { cmd_id, ok: true, token };
            }
            Err(TransportError::Transient(err)) => {
                tracing::warn!(cmd = %cmd_id, error = %err, backoff_ms = backoff.as_millis() as u64,
                    "transient store failure, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(PERSIST_RETRY_MAX);
            }
            Err(TransportError::Permanent(err)) => {
                tracing::error!(cmd = %cmd_id, error = %err, "permanent store failure");
                return Signal::PersistComplete { cmd_id, ok: false, token: None };
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
