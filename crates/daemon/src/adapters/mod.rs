// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter traits for the engine's external collaborators.
//!
//! The core reaches the power daemon, the document store, trigger event
//! sources, callback targets, and the container controls only through these
//! narrow interfaces. No-op implementations keep the daemon operational on
//! hosts without the real services; fakes live in [`fake`] for tests.

mod file_store;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
mod noop;

pub use file_store::FileStore;
pub use noop::{NoopCallbackSink, NoopContainerSink, NoopPowerAdapter, NoopTriggerSource};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use am_core::ActivityId;

use crate::engine::signal::Signal;

/// How adapters report back into the engine loop.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// Transport-level failure classification for store and callback calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Worth retrying: timeouts, connection loss.
    #[error("transient transport error: {0}")]
    Transient(String),
    /// Not worth retrying: bad target, rejected payload.
    #[error("permanent transport error: {0}")]
    Permanent(String),
}

/// The power daemon. Confirmations arrive as signals, not return values,
/// because a real daemon answers asynchronously on the bus.
#[async_trait]
pub trait PowerAdapter: Send + Sync {
    /// Take a named wake-lock for the Activity; send `PowerLocked` when held.
    async fn request_begin(&self, activity_id: ActivityId, signals: SignalSender);

    /// Release the wake-lock, after an optional debounce window; send
    /// `PowerUnlocked` when released.
    async fn request_end(
        &self,
        activity_id: ActivityId,
        debounce: Option<std::time::Duration>,
        signals: SignalSender,
    );
}

/// The external document store.
#[async_trait]
pub trait PersistStore: Send + Sync {
    /// Create or overwrite a document; returns `(doc_id, rev)`.
    async fn put(
        &self,
        doc_id: Option<String>,
        rev: Option<u64>,
        doc: Value,
    ) -> Result<(String, u64), TransportError>;

    /// Delete a document by id.
    async fn del(&self, doc_id: String, rev: Option<u64>) -> Result<(), TransportError>;

    /// Enumerate all stored Activity documents as `(doc_id, rev, doc)`.
    async fn load_all(&self) -> Result<Vec<(String, u64, Value)>, TransportError>;
}

/// Trigger event sources: bus subscriptions that stream response documents.
///
/// `subscribe` stays live until `cancel`; each response arrives as a
/// `TriggerResponse` signal and is matched by the engine.
#[async_trait]
pub trait TriggerSource: Send + Sync {
    async fn subscribe(
        &self,
        activity_id: ActivityId,
        method: String,
        params: Value,
        signals: SignalSender,
    );

    async fn cancel(&self, activity_id: ActivityId);
}

/// Callback targets: the RPC invoked when an Activity runs.
#[async_trait]
pub trait CallbackSink: Send + Sync {
    async fn invoke(
        &self,
        activity_id: ActivityId,
        method: String,
        params: Value,
    ) -> Result<(), TransportError>;
}

/// Container controls: cgroup priority writes and task-list updates.
///
/// Writes are best-effort: a vanished process is ignored, other I/O errors
/// are logged and the previous priority stands.
pub trait ContainerSink: Send + Sync {
    fn apply(&self, container: &str, priority: am_core::ActivityPriority, focused: bool);

    fn map_pid(&self, container: &str, pid: u32);
}
