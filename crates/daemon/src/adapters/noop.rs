// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op adapters: synchronous stand-ins for hosts without the real
//! services. Power transitions confirm immediately; triggers never fire;
//! callbacks succeed without calling anyone; container writes vanish.

use async_trait::async_trait;
use serde_json::Value;

use am_core::ActivityId;

use super::{CallbackSink, ContainerSink, PowerAdapter, SignalSender, TransportError, TriggerSource};
use crate::engine::signal::Signal;

#[derive(Debug, Default, Clone)]
pub struct NoopPowerAdapter;

#[async_trait]
impl PowerAdapter for NoopPowerAdapter {
    async fn request_begin(&self, activity_id: ActivityId, signals: SignalSender) {
        let _ = signals.send(Signal::PowerLocked { activity_id });
    }

    async fn request_end(
        &self,
        activity_id: ActivityId,
        _debounce: Option<std::time::Duration>,
        signals: SignalSender,
    ) {
        let _ = signals.send(Signal::PowerUnlocked { activity_id });
    }
}

#[derive(Debug, Default, Clone)]
pub struct NoopTriggerSource;

#[async_trait]
impl TriggerSource for NoopTriggerSource {
    async fn subscribe(
        &self,
        activity_id: ActivityId,
        method: String,
        _params: Value,
        _signals: SignalSender,
    ) {
        tracing::debug!(activity = %activity_id, method = %method, "trigger subscription opened (noop)");
    }

    async fn cancel(&self, _activity_id: ActivityId) {}
}

#[derive(Debug, Default, Clone)]
pub struct NoopCallbackSink;

#[async_trait]
impl CallbackSink for NoopCallbackSink {
    async fn invoke(
        &self,
        activity_id: ActivityId,
        method: String,
        _params: Value,
    ) -> Result<(), TransportError> {
        tracing::debug!(activity = %activity_id, method = %method, "callback invoked (noop)");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct NoopContainerSink;

impl ContainerSink for NoopContainerSink {
    fn apply(&self, container: &str, priority: am_core::ActivityPriority, focused: bool) {
        tracing::debug!(container, priority = %priority, focused, "container priority (noop)");
    }

    fn map_pid(&self, container: &str, pid: u32) {
        tracing::debug!(container, pid, "container pid mapping (noop)");
    }
}
