// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's state model.
//!
//! Everything here is owned by the single dispatch loop; there is no internal
//! locking, and correctness between suspension points follows from the
//! no-preemption invariant. Out-calls leave as effects and come back as
//! signals.

pub mod activity;
pub mod details;
pub mod lifecycle;
pub mod manager;
pub mod persist;
pub mod power;
pub mod queues;
pub mod registry;
pub mod requirement;
pub mod resource;
pub mod schedule;
pub mod subscription;
pub mod trigger;

use std::collections::HashMap;
use std::time::Duration;

use am_core::{ActivityId, SubscriptionId};

use self::persist::PersistPipeline;
use self::queues::RunQueues;
use self::registry::{IdAllocation, Registry};
use self::requirement::RequirementManager;
use self::resource::ResourceManager;
use self::schedule::ScheduleQueue;

/// Gate bit: the private-bus enable/disable switch.
pub const ENABLE_EXTERNAL: u32 = 0x1;
/// Gate bit: the UI reported ready.
pub const ENABLE_UI: u32 = 0x2;
/// Gate bit: persisted Activities finished loading.
pub const ENABLE_CONFIGURATION_LOADED: u32 = 0x4;
/// All gate bits; scheduling starts when every one is set.
pub const ENABLE_MASK: u32 = ENABLE_EXTERNAL | ENABLE_UI | ENABLE_CONFIGURATION_LOADED;

/// Scheduler and power tunables, resolved from the daemon config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Standard background slots; `None` is unlimited.
    pub background_concurrency: Option<u32>,
    /// Interactive background slots; `None` is unlimited.
    pub background_interactive_concurrency: Option<u32>,
    /// How long ready interactive Activities wait before one runner yields.
    pub yield_timeout: Duration,
    /// Wake-lock debounce window for `powerDebounce` Activities.
    pub power_debounce: Option<Duration>,
    pub allocation: IdAllocation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            background_concurrency: Some(1),
            background_interactive_concurrency: Some(2),
            yield_timeout: Duration::from_secs(60),
            power_debounce: Some(Duration::from_secs(10)),
            allocation: IdAllocation::Random,
        }
    }
}

/// The process-wide core state, owned by the engine loop.
#[derive(Debug)]
pub struct EngineState {
    pub config: EngineConfig,
    pub registry: Registry,
    pub queues: RunQueues,
    pub schedule_queue: ScheduleQueue,
    pub requirements: RequirementManager,
    pub persist: PersistPipeline,
    pub resources: ResourceManager,
    /// Gate bits; see [`ENABLE_MASK`].
    pub enabled: u32,
    /// Seconds east of UTC, applied to local-time schedules.
    pub local_offset_secs: i64,
    /// Whether the interactive yield timer is currently armed.
    pub yield_timer_armed: bool,
    /// Subscriptions held per client connection, for cleanup on close.
    pub conn_subs: HashMap<u64, Vec<(ActivityId, SubscriptionId)>>,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        let registry = Registry::new(config.allocation);
        Self {
            config,
            registry,
            queues: RunQueues::new(),
            schedule_queue: ScheduleQueue::default(),
            requirements: RequirementManager::new(),
            persist: PersistPipeline::new(),
            resources: ResourceManager::new(),
            enabled: 0,
            local_offset_secs: 0,
            yield_timer_armed: false,
            conn_subs: HashMap::new(),
        }
    }

    /// Track a subscription against its owning connection.
    pub fn track_conn_subscription(
        &mut self,
        conn_id: u64,
        activity_id: ActivityId,
        sub_id: SubscriptionId,
    ) {
        self.conn_subs.entry(conn_id).or_default().push((activity_id, sub_id));
    }

    pub fn untrack_conn_subscription(&mut self, conn_id: u64, sub_id: SubscriptionId) {
        if let Some(subs) = self.conn_subs.get_mut(&conn_id) {
            subs.retain(|(_, s)| *s != sub_id);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
