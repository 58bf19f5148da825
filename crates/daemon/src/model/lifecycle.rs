// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Activity lifecycle state machine.
//!
//! Transitions follow the request/grant pattern: an Activity asks the
//! manager for a schedule slot, a run slot, or a requeue; the manager grants
//! according to queue policy. Gating inputs (trigger, schedule, requirements,
//! power) feed back in through the notification functions at the bottom.

use chrono::{DateTime, Utc};

use am_core::{ActivityCommand, ActivityEvent, ActivityId, AmError, BusId, SubscriptionId};

use crate::engine::effect::{Effect, Fx};
use crate::engine::signal::CallbackOutcome;
use crate::model::power::PowerState;
use crate::model::subscription::Subscription;
use crate::model::trigger::Trigger;
use crate::model::EngineState;

impl EngineState {
    // ── command entry point ─────────────────────────────────────────────────

    /// Record a command and drive the resulting transition.
    ///
    /// Final commands are final; an external `start` on an uninitialized
    /// Activity first requests a schedule slot.
    pub fn send_command(
        &mut self,
        id: ActivityId,
        command: ActivityCommand,
        internal: bool,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) -> Result<(), AmError> {
        tracing::debug!(activity = %id, command = %command, internal, "command received");
        let needs_schedule = {
            let act = self.registry.require_mut(id)?;
            act.record_command(command, internal)?
        };
        if needs_schedule {
            self.request_schedule(id, now, fx);
        }

        let (ending, next, sent) = {
            let act = self.registry.require(id)?;
            (act.ending, act.compute_next_command(), act.sent_command)
        };
        if ending || next == sent {
            return Ok(());
        }

        let running = self.registry.require(id)?.running;
        if next.is_terminal() {
            if let Some(act) = self.registry.get_mut(id) {
                act.broadcast_command(next);
            }
            self.end_activity(id, now, fx);
        } else if !running && next == ActivityCommand::Start {
            // Not yet running: only actually run once scheduled, triggered,
            // due, and met.
            let (runnable, ready) = {
                let act = self.registry.require(id)?;
                (act.is_runnable(), act.ready)
            };
            if runnable && !ready {
                self.request_run(id, fx);
            }
        } else if let Some(act) = self.registry.get_mut(id) {
            // Already running: a transition to or from pause passes through.
            act.broadcast_command(next);
        }
        Ok(())
    }

    // ── request/grant pairs ─────────────────────────────────────────────────

    /// The Activity is fully initialized and wants a schedule slot.
    pub fn request_schedule(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        if let Some(act) = self.registry.get_mut(id) {
            act.initialized = true;
        }
        self.inform_initialized(id, now, fx);
    }

    /// Manager grant: arm the gating children and mark scheduled.
    pub fn schedule_granted(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        tracing::debug!(activity = %id, "schedule slot granted");
        let Some(act) = self.registry.get_mut(id) else {
            return;
        };
        if let Some(trigger) = act.trigger.as_mut() {
            if let Err(err) = trigger.arm(id, fx) {
                tracing::warn!(activity = %id, error = %err, "failed to arm trigger");
            }
        }
        act.scheduled = true;
        let has_schedule = act.schedule.is_some();
        if has_schedule {
            // May fire inline when the due time is already past.
            self.queue_schedule(id, now, fx);
        }
        let runnable = self
            .registry
            .get(id)
            .map(|a| !a.running && !a.ready && a.is_runnable())
            .unwrap_or(false);
        if runnable {
            self.request_run(id, fx);
        }
    }

    /// All prerequisites met: ask for a run slot.
    pub fn request_run(&mut self, id: ActivityId, fx: &mut Fx) {
        if let Some(act) = self.registry.get_mut(id) {
            act.ready = true;
        }
        self.inform_ready(id, fx);
    }

    /// Manager grant: lock power if needed, then actually run.
    pub fn run_granted(&mut self, id: ActivityId, fx: &mut Fx) {
        tracing::debug!(activity = %id, "run slot granted");
        let needs_lock = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            act.running = true;
            match act.power {
                Some(state) if !state.is_locked() => {
                    act.power = Some(PowerState::Locking);
                    true
                }
                _ => false,
            }
        };
        if needs_lock {
            tracing::debug!(activity = %id, "requesting wake-lock before start");
            fx.push(Effect::PowerBegin { activity_id: id });
        } else {
            self.do_run(id, fx);
        }
    }

    /// Broadcast `start` and fire the callback. Power is locked by now.
    fn do_run(&mut self, id: ActivityId, fx: &mut Fx) {
        let subscribers = {
            let Some(act) = self.registry.get(id) else {
                return;
            };
            act.unique_subscribers()
        };
        let (priority, focused) = {
            let Some(act) = self.registry.get(id) else {
                return;
            };
            (act.spec.activity_type.priority, act.focused)
        };
        for subscriber in &subscribers {
            self.resources.associate(id, priority, focused, subscriber, fx);
        }

        let callback = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            tracing::info!(activity = %id, name = act.name(), "running");
            act.broadcast_command(ActivityCommand::Start);
            act.spec.callback.clone()
        };
        if let Some(cb) = callback {
            let mut params = cb.params.clone();
            let info = serde_json::json!({"activityId": id.value()});
            match &mut params {
                serde_json::Value::Object(map) => {
                    map.insert("$activity".into(), info);
                }
                serde_json::Value::Null => {
                    params = serde_json::json!({ "$activity": info });
                }
                _ => {}
            }
            fx.push(Effect::InvokeCallback { activity_id: id, method: cb.method, params });
        }
    }

    /// End this run but return to the scheduled position, preserving trigger
    /// and schedule state.
    pub fn request_requeue(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        tracing::debug!(activity = %id, "preparing to requeue");
        if let Some(act) = self.registry.get_mut(id) {
            act.requeue = true;
        }
        self.end_activity(id, now, fx);
    }

    /// Come back from an ended run to the scheduled-and-maybe-runnable spot.
    fn requeue_activity(&mut self, id: ActivityId, fx: &mut Fx) {
        tracing::debug!(activity = %id, "requeuing");
        let runnable = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            act.running = false;
            act.ending = false;
            act.restart = false;
            act.requeue = false;
            act.yielding = false;
            act.is_runnable()
        };
        if runnable {
            self.request_run(id, fx);
        } else {
            if let Some(act) = self.registry.get_mut(id) {
                act.ready = false;
            }
            self.inform_not_ready(id, fx);
        }
    }

    /// Scheduler-initiated voluntary requeue of an interactive runner.
    pub fn yield_activity(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        let already = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            if act.yielding {
                true
            } else {
                act.yielding = true;
                act.requeue = true;
                act.broadcast_event(ActivityEvent::Yield);
                false
            }
        };
        if already {
            tracing::debug!(activity = %id, "already yielding");
        } else {
            tracing::info!(activity = %id, "yielding");
            self.end_activity(id, now, fx);
        }
    }

    // ── teardown ────────────────────────────────────────────────────────────

    /// Drive the ending path as far as current conditions allow.
    ///
    /// Re-entered when the last subscriber leaves, when the wake-lock
    /// releases, and when the persistence queue drains; each call advances
    /// whatever became possible.
    pub fn end_activity(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        let (requeue, unqueue) = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            if !act.ending {
                tracing::info!(activity = %id, name = act.name(), "ending");
                act.ending = true;
            }
            let requeue = act.should_requeue();
            let mut unqueue = false;
            // Trigger and schedule state survives a requeue.
            if !requeue {
                if let Some(trigger) = act.trigger.as_mut() {
                    if trigger.is_armed() {
                        let _ = trigger.disarm(id, fx);
                    }
                }
                unqueue = act.schedule.as_ref().map(|s| s.is_queued()).unwrap_or(false);
            }
            (requeue, unqueue)
        };
        if unqueue {
            self.unqueue_schedule(id, now, fx);
        }

        let (subscribed, power, wants_debounce, hooked) = {
            let Some(act) = self.registry.get(id) else {
                return;
            };
            (
                act.is_subscribed(),
                act.power,
                act.spec.activity_type.power_debounce,
                act.is_persist_command_hooked(),
            )
        };
        if subscribed {
            return;
        }

        // Power unlock starts only after the last subscriber is gone.
        if let Some(state) = power {
            if !state.is_unlocked() {
                if state != PowerState::Unlocking {
                    let debounce =
                        wants_debounce.then_some(self.config.power_debounce).flatten();
                    if let Some(act) = self.registry.get_mut(id) {
                        act.power = Some(PowerState::Unlocking);
                    }
                    tracing::debug!(activity = %id, "requesting wake-lock release");
                    fx.push(Effect::PowerEnd { activity_id: id, debounce });
                }
                return;
            }
        }

        if hooked {
            // Updates must land before a potentially updated Activity restarts.
            return;
        }

        self.inform_end(id, fx);

        if requeue {
            self.requeue_activity(id, fx);
            return;
        }

        let restart = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            if let Some(schedule) = act.schedule.as_mut() {
                schedule.inform_finished();
            }
            act.should_restart()
        };
        if restart {
            self.restart_activity(id, now, fx);
        } else {
            self.release_activity(id, fx);
        }
    }

    /// Clear the volatile word and run the FSM again from the top.
    fn restart_activity(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        tracing::info!(activity = %id, "restarting");
        self.resources.dissociate_all(id, fx);
        if let Some(act) = self.registry.get_mut(id) {
            act.reset_for_restart();
        }
        if let Err(err) = self.send_command(id, ActivityCommand::Start, false, now, fx) {
            tracing::warn!(activity = %id, error = %err, "restart start command failed");
        }
    }

    // ── subscriptions and ownership ─────────────────────────────────────────

    /// Attach a subscription, informing the priority binder if a new
    /// identity joined a running Activity.
    pub fn add_subscription(
        &mut self,
        id: ActivityId,
        sub: Subscription,
        fx: &mut Fx,
    ) -> Result<SubscriptionId, AmError> {
        let (sub_id, newly_seen, running, priority, focused) = {
            let act = self.registry.require_mut(id)?;
            let sub_id = sub.id;
            let newly_seen = act.add_subscription(sub);
            (sub_id, newly_seen, act.running, act.spec.activity_type.priority, act.focused)
        };
        if running {
            if let Some(subscriber) = newly_seen {
                self.resources.associate(id, priority, focused, &subscriber, fx);
            }
        }
        Ok(sub_id)
    }

    /// Detach a subscription and work through orphan/abandon fallout.
    pub fn remove_subscription(
        &mut self,
        id: ActivityId,
        sub_id: SubscriptionId,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) {
        let outcome = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            act.remove_subscription(sub_id)
        };
        if !outcome.removed {
            return;
        }
        if let Some(subscriber) = &outcome.lost_subscriber {
            self.resources.dissociate(id, subscriber, fx);
        }
        if outcome.orphaned {
            self.orphaned(id, now, fx);
        }
        if outcome.abandoned {
            tracing::debug!(activity = %id, "abandoned, no subscribers remaining");
            self.end_activity(id, now, fx);
        }
    }

    /// The parent went away with no successor.
    fn orphaned(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        let Some(act) = self.registry.get(id) else {
            return;
        };
        tracing::debug!(activity = %id, "orphaned");
        let cancel = if act.ending {
            // Waiting for remaining subscriptions to cancel.
            false
        } else if act.running {
            true
        } else if act.scheduled {
            // A callback will re-establish a parent through adoption when the
            // Activity runs; without one there is no way to find a parent.
            !act.has_callback()
        } else {
            true
        };
        if cancel {
            if let Err(err) = self.send_command(id, ActivityCommand::Cancel, true, now, fx) {
                tracing::warn!(activity = %id, error = %err, "orphan cancel failed");
            }
        }
    }

    /// Queue the caller to become parent; promote immediately if the spot is
    /// open. Returns whether adoption happened now.
    pub fn adopt(
        &mut self,
        id: ActivityId,
        sub_id: SubscriptionId,
        wait: bool,
    ) -> Result<bool, AmError> {
        let act = self.registry.require_mut(id)?;
        act.adopters.push_back(sub_id);
        if act.parent.is_some() {
            if !wait {
                act.adopters.retain(|a| *a != sub_id);
                return Err(AmError::would_block("activity already has a parent"));
            }
            tracing::debug!(activity = %id, "queued as adopter");
            return Ok(false);
        }
        act.promote_adopter();
        Ok(true)
    }

    /// The parent gives up the Activity; the head adopter (if any) takes
    /// over and both sides get notified.
    pub fn release(&mut self, id: ActivityId, caller: &BusId) -> Result<(), AmError> {
        let act = self.registry.require_mut(id)?;
        if act.released {
            return Err(AmError::invalid_argument("activity has already been released"));
        }
        match act.parent_subscriber() {
            Some(parent) if parent == caller => {}
            Some(_) | None => {
                return Err(AmError::wrong_caller("only the parent may release an activity"));
            }
        }
        act.released_parent = act.parent.take();
        act.released = true;
        tracing::info!(activity = %id, caller = %caller, "released");
        if !act.adopters.is_empty() {
            act.promote_adopter();
        }
        Ok(())
    }

    /// Verify the complete caller: the parent, or the creator with `force`.
    pub fn check_complete_caller(
        &self,
        id: ActivityId,
        caller: &BusId,
        force: bool,
    ) -> Result<(), AmError> {
        let act = self.registry.require(id)?;
        if force && *caller == act.creator {
            return Ok(());
        }
        let parent_ok =
            !act.released && act.parent_subscriber().map(|p| p == caller).unwrap_or(false);
        if parent_ok {
            Ok(())
        } else {
            Err(AmError::wrong_caller(
                "only the parent or (with force) the creator may complete an activity",
            ))
        }
    }

    // ── gating notifications ────────────────────────────────────────────────

    /// A trigger subscription produced a response document.
    pub fn trigger_response(
        &mut self,
        id: ActivityId,
        response: &serde_json::Value,
        fx: &mut Fx,
    ) {
        let owners = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            let Some(trigger) = act.trigger.as_mut() else {
                return;
            };
            trigger.on_response(id, response, fx)
        };
        for owner in owners {
            tracing::debug!(activity = %owner, "triggered");
            self.maybe_run(owner, fx);
        }
    }

    /// A schedule reached its due time.
    pub fn schedule_fired(&mut self, id: ActivityId, fx: &mut Fx) {
        let fired = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            match act.schedule.as_mut() {
                Some(schedule) => {
                    schedule.fire();
                    true
                }
                None => false,
            }
        };
        if fired {
            tracing::debug!(activity = %id, "schedule due");
            self.maybe_run(id, fx);
        }
    }

    /// A requirement provider reported a new value; fan out to every owner.
    pub fn requirement_changed(&mut self, name: &str, value: serde_json::Value, fx: &mut Fx) {
        if self.requirements.update(name, value.clone()).is_none() {
            tracing::warn!(requirement = name, "update for unregistered requirement");
            return;
        }
        for id in self.registry.ids() {
            let change = {
                let Some(act) = self.registry.get_mut(id) else {
                    continue;
                };
                let Some(req) = act.requirements.get_mut(name) else {
                    continue;
                };
                let was_met = req.met;
                req.current = value.clone();
                req.met = crate::model::requirement::Requirement::satisfies(
                    &req.desired,
                    &req.current,
                );
                Some((was_met, req.met))
            };
            match change {
                Some((false, true)) => self.requirement_met(id, name, fx),
                Some((true, false)) => self.requirement_unmet(id, name, fx),
                Some(_) => {
                    // Value moved without crossing the threshold.
                    if let Some(act) = self.registry.get_mut(id) {
                        act.broadcast_event(ActivityEvent::Update);
                    }
                }
                None => {}
            }
        }
    }

    fn requirement_met(&mut self, id: ActivityId, name: &str, fx: &mut Fx) {
        tracing::debug!(activity = %id, requirement = name, "requirement met");
        let all_met = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            act.broadcast_event(ActivityEvent::Update);
            !act.has_unmet_requirements()
        };
        if all_met {
            tracing::debug!(activity = %id, "all requirements met");
            self.maybe_run(id, fx);
        }
    }

    fn requirement_unmet(&mut self, id: ActivityId, name: &str, fx: &mut Fx) {
        tracing::debug!(activity = %id, requirement = name, "requirement unmet");
        let withdraw = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            if !act.running && act.ready {
                act.ready = false;
                true
            } else {
                false
            }
        };
        if withdraw {
            self.inform_not_ready(id, fx);
        }
        if let Some(act) = self.registry.get_mut(id) {
            act.broadcast_event(ActivityEvent::Update);
        }
    }

    /// Shared "could this start now" check after a gate opened.
    fn maybe_run(&mut self, id: ActivityId, fx: &mut Fx) {
        let eligible = {
            let Some(act) = self.registry.get(id) else {
                return;
            };
            !act.running && !act.ready && act.is_runnable()
        };
        if eligible {
            self.request_run(id, fx);
        }
    }

    // ── power confirmations ─────────────────────────────────────────────────

    pub fn power_locked(&mut self, id: ActivityId, fx: &mut Fx) {
        let ending = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            act.power = Some(PowerState::Locked);
            act.ending
        };
        tracing::debug!(activity = %id, "wake-lock held");
        if !ending {
            self.do_run(id, fx);
        }
    }

    pub fn power_unlocked(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        let ending = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            act.power = Some(PowerState::Unlocked);
            act.ending
        };
        tracing::debug!(activity = %id, "wake-lock released");
        if ending {
            self.end_activity(id, now, fx);
        }
    }

    // ── callback outcomes ───────────────────────────────────────────────────

    pub fn callback_result(
        &mut self,
        id: ActivityId,
        outcome: CallbackOutcome,
        now: DateTime<Utc>,
        fx: &mut Fx,
    ) {
        match outcome {
            CallbackOutcome::Succeeded => {}
            CallbackOutcome::Transient => {
                tracing::warn!(activity = %id, "callback failed transiently, requeuing");
                self.request_requeue(id, now, fx);
            }
            CallbackOutcome::Permanent => {
                tracing::warn!(activity = %id, "callback failed permanently, cancelling");
                if let Some(act) = self.registry.get_mut(id) {
                    act.terminate = true;
                }
                if let Err(err) = self.send_command(id, ActivityCommand::Cancel, true, now, fx) {
                    tracing::warn!(activity = %id, error = %err, "cancel after callback failure failed");
                }
            }
        }
    }

    // ── schedule queue plumbing ─────────────────────────────────────────────

    /// Queue the Activity's schedule, firing immediately if already due.
    pub fn queue_schedule(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        let offset = self.local_offset_secs;
        let next = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            let Some(schedule) = act.schedule.as_mut() else {
                return;
            };
            schedule.compute_next_due(now, offset);
            schedule.mark_queued();
            schedule.next_due()
        };
        match next {
            Some(due) if due <= now => self.schedule_fired(id, fx),
            Some(due) => {
                self.schedule_queue.insert(due, id);
                self.reschedule_wake_timer(now, fx);
            }
            None => {
                // Past its end time; it will never fire again.
                if let Some(act) = self.registry.get_mut(id) {
                    if let Some(schedule) = act.schedule.as_mut() {
                        schedule.mark_unqueued();
                    }
                }
            }
        }
    }

    pub fn unqueue_schedule(&mut self, id: ActivityId, now: DateTime<Utc>, fx: &mut Fx) {
        let next = {
            let Some(act) = self.registry.get_mut(id) else {
                return;
            };
            let Some(schedule) = act.schedule.as_mut() else {
                return;
            };
            let next = schedule.next_due();
            schedule.mark_unqueued();
            next
        };
        if let Some(due) = next {
            self.schedule_queue.remove(due, id);
            self.reschedule_wake_timer(now, fx);
        }
    }

    /// The wake timer fired: run everything due and re-arm.
    pub fn schedule_wake(&mut self, now: DateTime<Utc>, fx: &mut Fx) {
        let due = self.schedule_queue.pop_due(now);
        for id in due {
            self.schedule_fired(id, fx);
        }
        self.reschedule_wake_timer(now, fx);
    }

    /// Present the single next wake time to the external timer source.
    pub fn reschedule_wake_timer(&mut self, now: DateTime<Utc>, fx: &mut Fx) {
        use crate::engine::effect::TimerId;
        match self.schedule_queue.next_wake() {
            Some(at) => {
                let delay = (at - now).to_std().unwrap_or_default();
                fx.push(Effect::SetTimer { id: TimerId::ScheduleWake, delay });
            }
            None => fx.push(Effect::CancelTimer { id: TimerId::ScheduleWake }),
        }
    }

    /// Timezone moved: recompute every queued local-time schedule.
    pub fn timezone_changed(&mut self, offset_secs: i64, now: DateTime<Utc>, fx: &mut Fx) {
        if self.local_offset_secs == offset_secs {
            return;
        }
        tracing::info!(offset_secs, "local timezone offset changed");
        self.local_offset_secs = offset_secs;
        let local_ids: Vec<ActivityId> = self
            .registry
            .iter()
            .filter(|a| {
                a.schedule.as_ref().map(|s| s.spec.local && s.is_queued()).unwrap_or(false)
            })
            .map(|a| a.id)
            .collect();
        for id in local_ids {
            self.unqueue_schedule(id, now, fx);
            self.queue_schedule(id, now, fx);
        }
    }

    // ── construction ────────────────────────────────────────────────────────

    /// Instantiate gating children from the spec. Fails with
    /// `UnknownRequirement` before any state is shared.
    pub fn instantiate_gating(
        &mut self,
        act: &mut crate::model::activity::Activity,
    ) -> Result<(), AmError> {
        let mut requirements = indexmap::IndexMap::new();
        for (name, desired) in &act.spec.requirements {
            let req = self.requirements.instantiate(name, desired)?;
            requirements.insert(name.clone(), req);
        }
        act.requirements = requirements;
        act.trigger = act.spec.trigger.as_ref().map(|t| Trigger::exclusive(act.id, t));
        act.schedule =
            act.spec.schedule.as_ref().map(|s| crate::model::schedule::Schedule::new(s.clone()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
