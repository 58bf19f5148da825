// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager-side scheduling: run queues, concurrency caps, the interactive
//! yield timeout, the enable gate, focus, and the info dump.

use am_core::{ActivityEvent, ActivityId, AmError};

use crate::engine::effect::{Effect, Fx, TimerId};
use crate::model::queues::RunQueueId;
use crate::model::{EngineState, ENABLE_MASK};

impl EngineState {
    // ── enable gate ─────────────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        (self.enabled & ENABLE_MASK) == ENABLE_MASK
    }

    /// Set gate bits; when the last one lands, drain the initialized queue
    /// by granting schedule slots in FIFO order.
    pub fn enable(&mut self, mask: u32, now: chrono::DateTime<chrono::Utc>, fx: &mut Fx) {
        let was = self.is_enabled();
        self.enabled |= mask & ENABLE_MASK;
        tracing::info!(enabled = self.enabled, "manager enabled bits");
        if !was && self.is_enabled() {
            self.schedule_all_activities(now, fx);
        }
    }

    pub fn disable(&mut self, mask: u32) {
        self.enabled &= !(mask & ENABLE_MASK);
        tracing::info!(enabled = self.enabled, "manager enabled bits");
    }

    fn schedule_all_activities(&mut self, now: chrono::DateTime<chrono::Utc>, fx: &mut Fx) {
        tracing::info!("scheduling all parked activities");
        while let Some(id) = self.queues.front(RunQueueId::Initialized) {
            self.move_queue(id, RunQueueId::Scheduled);
            self.schedule_granted(id, now, fx);
        }
    }

    // ── queue bookkeeping ───────────────────────────────────────────────────

    /// Unlink from the current queue (if any) and push onto `to`.
    fn move_queue(&mut self, id: ActivityId, to: RunQueueId) {
        let from = self.registry.get(id).and_then(|a| a.queue);
        if let Some(from) = from {
            self.queues.unlink(from, id);
        }
        self.queues.push_back(to, id);
        if let Some(act) = self.registry.get_mut(id) {
            act.queue = Some(to);
        }
    }

    fn unlink_queue(&mut self, id: ActivityId) {
        let from = self.registry.get(id).and_then(|a| a.queue);
        if let Some(from) = from {
            self.queues.unlink(from, id);
        }
        if let Some(act) = self.registry.get_mut(id) {
            act.queue = None;
        }
    }

    // ── activity → manager notifications ────────────────────────────────────

    /// Initialized and ready to be scheduled when the manager allows.
    pub fn inform_initialized(
        &mut self,
        id: ActivityId,
        now: chrono::DateTime<chrono::Utc>,
        fx: &mut Fx,
    ) {
        // A restarting Activity is parked (briefly) in the ended queue.
        if self.is_enabled() {
            self.move_queue(id, RunQueueId::Scheduled);
            self.schedule_granted(id, now, fx);
        } else {
            tracing::debug!(activity = %id, "manager not enabled, parking");
            self.move_queue(id, RunQueueId::Initialized);
        }
    }

    /// Prerequisites met; immediate Activities bypass background queueing.
    pub fn inform_ready(&mut self, id: ActivityId, fx: &mut Fx) {
        let (immediate, interactive) = {
            let Some(act) = self.registry.get(id) else {
                return;
            };
            (act.is_immediate(), act.is_user_initiated())
        };
        if immediate {
            self.move_queue(id, RunQueueId::Immediate);
            self.run_now(id, fx);
        } else {
            if interactive {
                self.move_queue(id, RunQueueId::ReadyInteractive);
            } else {
                self.move_queue(id, RunQueueId::Ready);
            }
            self.check_ready_queue(fx);
        }
    }

    /// Prerequisites no longer met; back to the scheduled queue.
    pub fn inform_not_ready(&mut self, id: ActivityId, _fx: &mut Fx) {
        self.move_queue(id, RunQueueId::Scheduled);
    }

    /// This incarnation is done; free its slot and see what can run.
    pub fn inform_end(&mut self, id: ActivityId, fx: &mut Fx) {
        self.move_queue(id, RunQueueId::Ended);
        self.resources.dissociate_all(id, fx);
        self.check_ready_queue(fx);
    }

    /// Drop the Activity from the registry entirely.
    pub fn release_activity(&mut self, id: ActivityId, fx: &mut Fx) {
        tracing::info!(activity = %id, "releasing");
        self.unlink_queue(id);
        self.registry.remove(id);
        self.check_ready_queue(fx);
    }

    // ── slot filling ────────────────────────────────────────────────────────

    fn under_cap(&self, cap: Option<u32>) -> bool {
        match cap {
            None => true,
            Some(cap) => self.queues.running_background_count() < cap as usize,
        }
    }

    /// Associate subscribers with the binder and grant the run.
    fn run_now(&mut self, id: ActivityId, fx: &mut Fx) {
        self.run_granted(id, fx);
    }

    /// Fill free background slots: interactive first (respecting its cap),
    /// then standard.
    pub fn check_ready_queue(&mut self, fx: &mut Fx) {
        let mut ran_interactive = false;
        while self.under_cap(self.config.background_interactive_concurrency)
            && !self.queues.is_empty(RunQueueId::ReadyInteractive)
        {
            if let Some(id) = self.queues.front(RunQueueId::ReadyInteractive) {
                self.move_queue(id, RunQueueId::BackgroundInteractive);
                self.run_now(id, fx);
                ran_interactive = true;
            }
        }

        if !self.queues.is_empty(RunQueueId::ReadyInteractive) {
            if ran_interactive || !self.yield_timer_armed {
                self.update_yield_timeout(fx);
            }
        } else if self.yield_timer_armed {
            self.cancel_yield_timeout(fx);
        }

        while self.under_cap(self.config.background_concurrency)
            && !self.queues.is_empty(RunQueueId::Ready)
        {
            if let Some(id) = self.queues.front(RunQueueId::Ready) {
                self.move_queue(id, RunQueueId::Background);
                self.run_now(id, fx);
            }
        }
    }

    // ── interactive yield ───────────────────────────────────────────────────

    fn update_yield_timeout(&mut self, fx: &mut Fx) {
        tracing::debug!(
            seconds = self.config.yield_timeout.as_secs(),
            "arming interactive yield timeout"
        );
        self.yield_timer_armed = true;
        fx.push(Effect::SetTimer { id: TimerId::InteractiveYield, delay: self.config.yield_timeout });
    }

    fn cancel_yield_timeout(&mut self, fx: &mut Fx) {
        tracing::debug!("cancelling interactive yield timeout");
        self.yield_timer_armed = false;
        fx.push(Effect::CancelTimer { id: TimerId::InteractiveYield });
    }

    /// Ask exactly one non-yielding interactive runner to yield, but never
    /// more than are waiting in the ready-interactive queue.
    pub fn interactive_yield_timeout(
        &mut self,
        now: chrono::DateTime<chrono::Utc>,
        fx: &mut Fx,
    ) {
        self.yield_timer_armed = false;
        if self.queues.is_empty(RunQueueId::ReadyInteractive) {
            self.cancel_yield_timeout(fx);
            return;
        }

        let waiting = self.queues.len(RunQueueId::ReadyInteractive);
        let mut yielding = 0usize;
        let mut victim = None;
        let mut capped = false;
        for id in self.queues.iter(RunQueueId::BackgroundInteractive) {
            let is_yielding =
                self.registry.get(id).map(|a| a.yielding).unwrap_or(false);
            if is_yielding {
                yielding += 1;
                if yielding >= waiting {
                    capped = true;
                    break;
                }
            } else if victim.is_none() {
                victim = Some(id);
            }
        }

        if capped {
            tracing::debug!("as many yielding as waiting, not asking for more");
        } else if let Some(id) = victim {
            tracing::info!(activity = %id, "requesting yield");
            self.yield_activity(id, now, fx);
        } else {
            tracing::debug!("all interactive runners already yielding");
        }
        self.update_yield_timeout(fx);
    }

    // ── eviction (devel surface) ────────────────────────────────────────────

    /// Move a running Activity from `background` to `longBackground`,
    /// freeing its slot without ending it.
    #[cfg(any(test, feature = "devel"))]
    pub fn evict_background_activity(&mut self, id: ActivityId, fx: &mut Fx) -> Result<(), AmError> {
        if !self.queues.contains(RunQueueId::Background, id) {
            return Err(AmError::invalid_argument("activity not on the background queue"));
        }
        self.move_queue(id, RunQueueId::LongBackground);
        self.check_ready_queue(fx);
        Ok(())
    }

    #[cfg(any(test, feature = "devel"))]
    pub fn evict_all_background_activities(&mut self, fx: &mut Fx) {
        while let Some(id) = self.queues.front(RunQueueId::Background) {
            self.move_queue(id, RunQueueId::LongBackground);
        }
        self.check_ready_queue(fx);
    }

    #[cfg(any(test, feature = "devel"))]
    pub fn set_background_concurrency(&mut self, level: Option<u32>, fx: &mut Fx) {
        self.config.background_concurrency = level;
        self.check_ready_queue(fx);
    }

    // ── focus ───────────────────────────────────────────────────────────────

    pub fn focus_activity(&mut self, id: ActivityId, fx: &mut Fx) -> Result<(), AmError> {
        let priority = {
            let act = self.registry.require_mut(id)?;
            if act.focused {
                return Ok(());
            }
            act.focused = true;
            act.broadcast_event(ActivityEvent::Focus);
            act.spec.activity_type.priority
        };
        self.resources.update_contribution(id, priority, true, fx);
        Ok(())
    }

    pub fn unfocus_activity(&mut self, id: ActivityId, fx: &mut Fx) -> Result<(), AmError> {
        let priority = {
            let act = self.registry.require_mut(id)?;
            if !act.focused {
                return Ok(());
            }
            act.focused = false;
            act.broadcast_event(ActivityEvent::Unfocus);
            act.spec.activity_type.priority
        };
        self.resources.update_contribution(id, priority, false, fx);
        Ok(())
    }

    /// Copy focus from a focused source onto a target.
    pub fn add_focus(
        &mut self,
        source: ActivityId,
        target: ActivityId,
        fx: &mut Fx,
    ) -> Result<(), AmError> {
        let focused = self.registry.require(source)?.focused;
        if !focused {
            return Err(AmError::invalid_argument("source activity is not focused"));
        }
        self.registry.require(target)?;
        self.focus_activity(target, fx)
    }

    // ── info dump ───────────────────────────────────────────────────────────

    pub fn info(&self) -> am_wire::ManagerInfo {
        let mut enabled = Vec::new();
        if self.enabled & crate::model::ENABLE_EXTERNAL != 0 {
            enabled.push("external".to_string());
        }
        if self.enabled & crate::model::ENABLE_UI != 0 {
            enabled.push("ui".to_string());
        }
        if self.enabled & crate::model::ENABLE_CONFIGURATION_LOADED != 0 {
            enabled.push("configurationLoaded".to_string());
        }
        let queues = RunQueueId::ALL
            .iter()
            .map(|q| am_wire::QueueInfo {
                name: q.to_string(),
                activities: self.queues.iter(*q).collect(),
            })
            .collect();
        am_wire::ManagerInfo {
            enabled,
            background_concurrency: self.config.background_concurrency,
            background_interactive_concurrency: self.config.background_interactive_concurrency,
            yield_timeout_seconds: self.config.yield_timeout.as_secs(),
            queues,
            containers: self.resources.snapshot(),
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
