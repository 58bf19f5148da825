// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Activity entity.
//!
//! Holds the declarative spec, the internal lifecycle word, the gating
//! children (trigger, schedule, requirements, power), the subscription set,
//! and the persistence hook queue. Transitions that need the registry or the
//! run queues live on `EngineState`; everything local to one Activity lives
//! here.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde_json::Value;

use am_core::{
    ActivityCommand, ActivityEvent, ActivityId, ActivitySpec, ActivityState, AmError, BusId, CmdId,
    SubscriptionId,
};
use am_wire::EventRecord;

use crate::model::power::PowerState;
use crate::model::queues::RunQueueId;
use crate::model::requirement::Requirement;
use crate::model::schedule::Schedule;
use crate::model::subscription::Subscription;
use crate::model::trigger::Trigger;
use crate::model::persist::PersistToken;

/// What fell out of removing a subscription; the manager acts on each part.
#[derive(Debug, Default)]
pub struct RemovalOutcome {
    pub removed: bool,
    /// The identity lost its last subscription while the Activity ran.
    pub lost_subscriber: Option<BusId>,
    /// A queued adopter was promoted to parent.
    pub promoted: bool,
    /// The parent left with no adopter, but other subscriptions remain.
    pub orphaned: bool,
    /// The last subscription left.
    pub abandoned: bool,
}

/// A long-lived unit of work owned by the manager.
#[derive(Debug)]
pub struct Activity {
    pub id: ActivityId,
    pub spec: ActivitySpec,
    pub creator: BusId,
    /// Volatile; set by the focus protocol, never persisted.
    pub focused: bool,

    // Lifecycle word
    pub initialized: bool,
    pub scheduled: bool,
    pub ready: bool,
    pub running: bool,
    pub ending: bool,
    pub terminate: bool,
    pub restart: bool,
    pub requeue: bool,
    pub yielding: bool,
    pub released: bool,

    pub int_command: ActivityCommand,
    pub ext_command: ActivityCommand,
    pub sent_command: ActivityCommand,

    // Gating children
    pub trigger: Option<Trigger>,
    pub schedule: Option<Schedule>,
    pub requirements: IndexMap<String, Requirement>,
    pub power: Option<PowerState>,

    // Subscriptions and ownership
    pub subscriptions: IndexMap<SubscriptionId, Subscription>,
    /// Multiset of identities: one entry per live subscription.
    pub subscribers: Vec<BusId>,
    pub parent: Option<SubscriptionId>,
    pub released_parent: Option<SubscriptionId>,
    pub adopters: VecDeque<SubscriptionId>,

    // Persistence
    pub persist_token: Option<PersistToken>,
    pub persist_commands: VecDeque<CmdId>,

    /// Which run queue the Activity currently occupies, if any.
    pub queue: Option<RunQueueId>,
    pub name_registered: bool,
}

impl Activity {
    pub fn new(id: ActivityId, spec: ActivitySpec, creator: BusId) -> Self {
        let power = spec.activity_type.power.then(PowerState::default);
        Self {
            id,
            spec,
            creator,
            focused: false,
            initialized: false,
            scheduled: false,
            ready: false,
            running: false,
            ending: false,
            terminate: false,
            restart: false,
            requeue: false,
            yielding: false,
            released: false,
            int_command: ActivityCommand::None,
            ext_command: ActivityCommand::None,
            sent_command: ActivityCommand::None,
            trigger: None,
            schedule: None,
            requirements: IndexMap::new(),
            power,
            subscriptions: IndexMap::new(),
            subscribers: Vec::new(),
            parent: None,
            released_parent: None,
            adopters: VecDeque::new(),
            persist_token: None,
            persist_commands: VecDeque::new(),
            queue: None,
            name_registered: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn is_persistent(&self) -> bool {
        self.spec.activity_type.persistent
    }

    pub fn is_immediate(&self) -> bool {
        self.spec.activity_type.immediate
    }

    pub fn is_user_initiated(&self) -> bool {
        self.spec.activity_type.user_initiated
    }

    pub fn has_callback(&self) -> bool {
        self.spec.callback.is_some()
    }

    // ── command word ─────────────────────────────────────────────────────────

    /// The dominant of the internal and external intents: what `sendCommand`
    /// would announce next.
    pub fn compute_next_command(&self) -> ActivityCommand {
        self.int_command.merge(self.ext_command)
    }

    /// Record a command word. Final commands are final: a second attempt to
    /// end through the same word is rejected.
    ///
    /// Returns true when an external `start` must first request a schedule
    /// slot (the Activity was never initialized).
    pub fn record_command(
        &mut self,
        command: ActivityCommand,
        internal: bool,
    ) -> Result<bool, AmError> {
        use ActivityCommand::{Cancel, Complete, Start, Stop};
        let mut needs_schedule = false;
        if internal {
            if matches!(self.int_command, Cancel | Stop) {
                return Err(AmError::internal(
                    "a final internal command was already issued to this activity",
                ));
            }
            self.int_command = command;
        } else {
            if command == Start && !self.initialized && !self.ending {
                needs_schedule = true;
            }
            if matches!(self.ext_command, Cancel | Stop | Complete) {
                return Err(AmError::invalid_argument(
                    "activity has already been told to end",
                ));
            }
            self.ext_command = command;
        }
        Ok(needs_schedule)
    }

    // ── gating ───────────────────────────────────────────────────────────────

    pub fn is_triggered(&self) -> bool {
        self.trigger.as_ref().map(Trigger::is_triggered).unwrap_or(true)
    }

    pub fn is_schedule_due(&self) -> bool {
        self.schedule.as_ref().map(Schedule::is_due).unwrap_or(true)
    }

    pub fn unmet_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values().filter(|r| !r.met)
    }

    pub fn has_unmet_requirements(&self) -> bool {
        self.requirements.values().any(|r| !r.met)
    }

    /// Scheduled, not ending, commanded to start, triggered, due, and met.
    pub fn is_runnable(&self) -> bool {
        self.scheduled
            && !self.ending
            && self.compute_next_command() == ActivityCommand::Start
            && self.is_triggered()
            && self.is_schedule_due()
            && !self.has_unmet_requirements()
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.ending
    }

    /// Restart once ended: persistent and explicit Activities survive, as do
    /// schedules that want another pass, unless the Activity was terminated.
    pub fn should_restart(&self) -> bool {
        self.has_callback()
            && !self.terminate
            && (self.restart
                || self.is_persistent()
                || self.spec.activity_type.explicit
                || self.schedule.as_ref().map(Schedule::should_reschedule).unwrap_or(false))
    }

    /// Requeue resumes from the scheduled position without advancing the
    /// schedule or dropping trigger state.
    pub fn should_requeue(&self) -> bool {
        self.has_callback() && !self.terminate && self.requeue && !self.restart
    }

    /// Client-visible state, computed from the lifecycle word.
    pub fn state(&self) -> ActivityState {
        if self.ending {
            let empty = self.subscriptions.is_empty();
            return match self.sent_command {
                ActivityCommand::Cancel => {
                    if empty {
                        ActivityState::Cancelled
                    } else {
                        ActivityState::Cancelling
                    }
                }
                ActivityCommand::Stop => {
                    if empty {
                        ActivityState::Stopped
                    } else {
                        ActivityState::Stopping
                    }
                }
                ActivityCommand::Complete => {
                    if empty {
                        ActivityState::Complete
                    } else {
                        ActivityState::Completing
                    }
                }
                // Ending without a terminal broadcast: an internal teardown.
                _ => ActivityState::Cancelling,
            };
        }
        if self.running {
            return match self.sent_command {
                ActivityCommand::Pause => ActivityState::Paused,
                ActivityCommand::Start => ActivityState::Running,
                _ => ActivityState::Starting,
            };
        }
        if self.scheduled {
            if self.has_unmet_requirements() {
                ActivityState::Blocked
            } else if self.ready && !self.running {
                ActivityState::Queued
            } else {
                ActivityState::Waiting
            }
        } else {
            ActivityState::Init
        }
    }

    // ── subscriptions ────────────────────────────────────────────────────────

    /// Insert a subscription; returns the identity if it is newly seen (the
    /// manager informs the priority binder while running).
    pub fn add_subscription(&mut self, sub: Subscription) -> Option<BusId> {
        let subscriber = sub.subscriber.clone();
        let newly_seen = !self.subscribers.contains(&subscriber);
        self.subscribers.push(subscriber.clone());
        self.subscriptions.insert(sub.id, sub);
        tracing::debug!(activity = %self.id, subscriber = %subscriber, "subscribed");
        newly_seen.then_some(subscriber)
    }

    /// Remove a subscription and work through the ownership fallout.
    pub fn remove_subscription(&mut self, sub_id: SubscriptionId) -> RemovalOutcome {
        let mut outcome = RemovalOutcome::default();
        let Some(sub) = self.subscriptions.shift_remove(&sub_id) else {
            tracing::warn!(activity = %self.id, subscription = %sub_id, "subscription not found on removal");
            return outcome;
        };
        outcome.removed = true;
        let subscriber = sub.subscriber;
        tracing::debug!(activity = %self.id, subscriber = %subscriber, "unsubscribed");

        if let Some(pos) = self.subscribers.iter().position(|s| *s == subscriber) {
            self.subscribers.remove(pos);
        }
        if self.running && !self.subscribers.contains(&subscriber) {
            outcome.lost_subscriber = Some(subscriber);
        }

        self.adopters.retain(|a| *a != sub_id);
        if self.released_parent == Some(sub_id) {
            self.released_parent = None;
        }

        if self.parent == Some(sub_id) {
            self.parent = None;
            if self.adopters.is_empty() {
                if !self.subscriptions.is_empty() {
                    outcome.orphaned = true;
                }
            } else {
                self.promote_adopter();
                outcome.promoted = true;
            }
        }

        if self.subscriptions.is_empty() {
            outcome.abandoned = true;
        }
        outcome
    }

    /// Make the head adopter the parent, notifying the released parent (if it
    /// still waits for the handoff) and the new parent.
    pub fn promote_adopter(&mut self) {
        if let Some(old) = self.released_parent.take() {
            self.queue_event_to(old, ActivityEvent::Adopted);
        }
        let Some(next) = self.adopters.pop_front() else {
            return;
        };
        self.parent = Some(next);
        self.queue_event_to(next, ActivityEvent::Orphan);
        self.released = false;
        if self.ending {
            tracing::debug!(activity = %self.id, "clearing ending flag, new parent found");
            self.ending = false;
        }
        if let Some(sub) = self.subscriptions.get(&next) {
            tracing::info!(activity = %self.id, parent = %sub.subscriber, "adopted");
        }
    }

    /// Queue an event for one subscription and flush if ungated.
    pub fn queue_event_to(&mut self, sub_id: SubscriptionId, event: ActivityEvent) {
        let gated = self.is_persist_command_hooked();
        let id = self.id;
        if let Some(sub) = self.subscriptions.get_mut(&sub_id) {
            sub.queue_event(EventRecord::new(event, id));
            sub.flush(gated);
        }
    }

    /// Broadcast a lifecycle event to every subscription.
    pub fn broadcast_event(&mut self, event: ActivityEvent) {
        tracing::debug!(activity = %self.id, event = %event, "broadcasting event");
        let gated = self.is_persist_command_hooked();
        let record = EventRecord::new(event, self.id);
        for sub in self.subscriptions.values_mut() {
            sub.queue_event(record.clone());
            sub.flush(gated);
        }
    }

    /// Broadcast the event for an announced command and update `sentCommand`.
    pub fn broadcast_command(&mut self, command: ActivityCommand) {
        if let Some(event) = command.as_event() {
            self.broadcast_event(event);
        }
        self.sent_command = command;
    }

    pub fn plug_all_subscriptions(&mut self) {
        tracing::debug!(activity = %self.id, "plugging all subscriptions");
        for sub in self.subscriptions.values_mut() {
            sub.plug();
        }
    }

    pub fn unplug_all_subscriptions(&mut self) {
        tracing::debug!(activity = %self.id, "unplugging all subscriptions");
        let gated = self.is_persist_command_hooked();
        for sub in self.subscriptions.values_mut() {
            sub.unplug();
            sub.flush(gated);
        }
    }

    /// Re-flush every subscription after the persist gate opens.
    pub fn flush_subscriptions(&mut self) {
        let gated = self.is_persist_command_hooked();
        for sub in self.subscriptions.values_mut() {
            sub.flush(gated);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Distinct subscriber identities, in first-subscribe order.
    pub fn unique_subscribers(&self) -> Vec<BusId> {
        let mut out: Vec<BusId> = Vec::new();
        for s in &self.subscribers {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
        out
    }

    pub fn parent_subscriber(&self) -> Option<&BusId> {
        let id = self.parent?;
        self.subscriptions.get(&id).map(|s| &s.subscriber)
    }

    // ── persistence hooks ────────────────────────────────────────────────────

    pub fn hook_persist_command(&mut self, cmd: CmdId) {
        tracing::debug!(activity = %self.id, cmd = %cmd, "hooking persist command");
        self.persist_commands.push_back(cmd);
    }

    /// Remove a completed command. Off-head removal is tolerated with a
    /// warning so a mis-ordered chain cannot wedge the Activity.
    ///
    /// Returns true when the queue transitioned to empty.
    pub fn unhook_persist_command(&mut self, cmd: CmdId) -> bool {
        match self.persist_commands.front() {
            Some(head) if *head == cmd => {
                self.persist_commands.pop_front();
            }
            _ => {
                if let Some(pos) = self.persist_commands.iter().position(|c| *c == cmd) {
                    tracing::warn!(activity = %self.id, cmd = %cmd,
                        "unhooking persist command out of queue order");
                    self.persist_commands.remove(pos);
                } else {
                    tracing::warn!(activity = %self.id, cmd = %cmd,
                        "persist command not in queue");
                    return false;
                }
            }
        }
        if self.persist_commands.is_empty() {
            self.unplug_all_subscriptions();
            true
        } else {
            false
        }
    }

    pub fn is_persist_command_hooked(&self) -> bool {
        !self.persist_commands.is_empty()
    }

    pub fn hooked_persist_command(&self) -> Option<CmdId> {
        self.persist_commands.front().copied()
    }

    // ── restart ──────────────────────────────────────────────────────────────

    /// Reset the volatile lifecycle word for a fresh pass through the FSM.
    /// The caller re-issues the start command.
    pub fn reset_for_restart(&mut self) {
        self.initialized = false;
        self.scheduled = false;
        self.ready = false;
        self.running = false;
        self.ending = false;
        self.restart = false;
        self.requeue = false;
        self.yielding = false;
        self.focused = false;
        self.int_command = ActivityCommand::None;
        self.ext_command = ActivityCommand::None;
        self.sent_command = ActivityCommand::None;
    }

    /// Serialize for the document store: the full declarative spec plus
    /// identity, so a reload reconstructs `(name, creator)` and the id.
    pub fn to_document(&self) -> Value {
        let mut doc = serde_json::to_value(&self.spec).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut doc {
            map.insert("activityId".into(), serde_json::json!(self.id));
            map.insert("creator".into(), serde_json::json!(self.creator));
        }
        doc
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
