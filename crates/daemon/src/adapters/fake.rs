// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters for tests: scripted outcomes, recorded calls, manual
//! confirmation of asynchronous transitions.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use am_core::ActivityId;

use super::{
    CallbackSink, ContainerSink, PersistStore, PowerAdapter, SignalSender, TransportError,
    TriggerSource,
};
use crate::engine::signal::Signal;

/// Power adapter that records requests; confirmations are released manually
/// (or immediately when `auto_confirm` is set).
#[derive(Clone, Default)]
pub struct FakePowerAdapter {
    inner: Arc<Mutex<FakePowerInner>>,
}

#[derive(Default)]
struct FakePowerInner {
    auto_confirm: bool,
    pending: Vec<(ActivityId, bool, SignalSender)>,
    pub begins: Vec<ActivityId>,
    pub ends: Vec<ActivityId>,
}

impl FakePowerAdapter {
    pub fn auto_confirm() -> Self {
        let adapter = Self::default();
        adapter.inner.lock().auto_confirm = true;
        adapter
    }

    /// Release every pending confirmation.
    pub fn confirm_all(&self) {
        let pending: Vec<_> = std::mem::take(&mut self.inner.lock().pending);
        for (activity_id, begin, signals) in pending {
            let signal = if begin {
                Signal::PowerLocked { activity_id }
            } else {
                Signal::PowerUnlocked { activity_id }
            };
            let _ = signals.send(signal);
        }
    }

    pub fn begin_count(&self) -> usize {
        self.inner.lock().begins.len()
    }

    pub fn end_count(&self) -> usize {
        self.inner.lock().ends.len()
    }
}

#[async_trait]
impl PowerAdapter for FakePowerAdapter {
    async fn request_begin(&self, activity_id: ActivityId, signals: SignalSender) {
        let mut inner = self.inner.lock();
        inner.begins.push(activity_id);
        if inner.auto_confirm {
            let _ = signals.send(Signal::PowerLocked { activity_id });
        } else {
            inner.pending.push((activity_id, true, signals));
        }
    }

    async fn request_end(
        &self,
        activity_id: ActivityId,
        _debounce: Option<std::time::Duration>,
        signals: SignalSender,
    ) {
        let mut inner = self.inner.lock();
        inner.ends.push(activity_id);
        if inner.auto_confirm {
            let _ = signals.send(Signal::PowerUnlocked { activity_id });
        } else {
            inner.pending.push((activity_id, false, signals));
        }
    }
}

/// In-memory document store with scripted failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    docs: HashMap<String, (u64, Value)>,
    next_id: u64,
    /// Errors returned (and consumed) before operations succeed.
    scripted_failures: Vec<TransportError>,
    pub puts: usize,
    pub dels: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next store operation.
    pub fn fail_next(&self, err: TransportError) {
        self.inner.lock().scripted_failures.push(err);
    }

    pub fn doc_count(&self) -> usize {
        self.inner.lock().docs.len()
    }

    pub fn put_count(&self) -> usize {
        self.inner.lock().puts
    }

    pub fn del_count(&self) -> usize {
        self.inner.lock().dels
    }

    pub fn docs(&self) -> Vec<(String, u64, Value)> {
        self.inner
            .lock()
            .docs
            .iter()
            .map(|(id, (rev, doc))| (id.clone(), *rev, doc.clone()))
            .collect()
    }

    /// Seed a document directly, as if persisted by a previous process run.
    pub fn seed(&self, doc_id: &str, rev: u64, mut doc: Value) {
        if let Value::Object(map) = &mut doc {
            map.insert("_id".into(), Value::String(doc_id.to_string()));
            map.insert("_rev".into(), serde_json::json!(rev));
        }
        self.inner.lock().docs.insert(doc_id.to_string(), (rev, doc));
    }

    fn take_failure(&self) -> Option<TransportError> {
        let mut inner = self.inner.lock();
        if inner.scripted_failures.is_empty() {
            None
        } else {
            Some(inner.scripted_failures.remove(0))
        }
    }
}

#[async_trait]
impl PersistStore for MemoryStore {
    async fn put(
        &self,
        doc_id: Option<String>,
        rev: Option<u64>,
        mut doc: Value,
    ) -> Result<(String, u64), TransportError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        inner.puts += 1;
        let doc_id = doc_id.unwrap_or_else(|| {
            inner.next_id += 1;
            format!("doc-{}", inner.next_id)
        });
        let rev = rev.unwrap_or(0) + 1;
        if let Value::Object(map) = &mut doc {
            map.insert("_id".into(), Value::String(doc_id.clone()));
            map.insert("_rev".into(), serde_json::json!(rev));
        }
        inner.docs.insert(doc_id.clone(), (rev, doc));
        Ok((doc_id, rev))
    }

    async fn del(&self, doc_id: String, _rev: Option<u64>) -> Result<(), TransportError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        inner.dels += 1;
        inner.docs.remove(&doc_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(String, u64, Value)>, TransportError> {
        Ok(self.docs())
    }
}

/// Trigger source that records subscriptions; tests fire responses through
/// the signal channel themselves.
#[derive(Clone, Default)]
pub struct FakeTriggerSource {
    inner: Arc<Mutex<Vec<(ActivityId, String)>>>,
}

impl FakeTriggerSource {
    pub fn subscriptions(&self) -> Vec<(ActivityId, String)> {
        self.inner.lock().clone()
    }
}

#[async_trait]
impl TriggerSource for FakeTriggerSource {
    async fn subscribe(
        &self,
        activity_id: ActivityId,
        method: String,
        _params: Value,
        _signals: SignalSender,
    ) {
        self.inner.lock().push((activity_id, method));
    }

    async fn cancel(&self, activity_id: ActivityId) {
        self.inner.lock().retain(|(id, _)| *id != activity_id);
    }
}

/// Callback sink with scripted outcomes per invocation.
#[derive(Clone, Default)]
pub struct FakeCallbackSink {
    inner: Arc<Mutex<FakeCallbackInner>>,
}

#[derive(Default)]
struct FakeCallbackInner {
    pub invocations: Vec<(ActivityId, String, Value)>,
    scripted: Vec<Result<(), TransportError>>,
}

impl FakeCallbackSink {
    pub fn invocations(&self) -> Vec<(ActivityId, String, Value)> {
        self.inner.lock().invocations.clone()
    }

    pub fn script(&self, outcome: Result<(), TransportError>) {
        self.inner.lock().scripted.push(outcome);
    }
}

#[async_trait]
impl CallbackSink for FakeCallbackSink {
    async fn invoke(
        &self,
        activity_id: ActivityId,
        method: String,
        params: Value,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.invocations.push((activity_id, method, params));
        if inner.scripted.is_empty() {
            Ok(())
        } else {
            inner.scripted.remove(0)
        }
    }
}

/// Container sink recording applied priorities.
#[derive(Clone, Default)]
pub struct FakeContainerSink {
    inner: Arc<Mutex<Vec<(String, am_core::ActivityPriority, bool)>>>,
}

impl FakeContainerSink {
    pub fn applied(&self) -> Vec<(String, am_core::ActivityPriority, bool)> {
        self.inner.lock().clone()
    }
}

impl ContainerSink for FakeContainerSink {
    fn apply(&self, container: &str, priority: am_core::ActivityPriority, focused: bool) {
        self.inner.lock().push((container.to_string(), priority, focused));
    }

    fn map_pid(&self, _container: &str, _pid: u32) {}
}
