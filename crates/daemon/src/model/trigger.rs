// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger state.
//!
//! A trigger is a subscription to an external event stream plus a matcher.
//! The subscription stays open only while the trigger is armed; the first
//! matching response latches it and drops the subscription.

use am_core::{ActivityId, AmError, TriggerMatcher, TriggerSpec};
use serde_json::Value;

use crate::engine::effect::{Effect, Fx};

/// Who a trigger fires for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerBinding {
    /// Owned by exactly one Activity; arm/disarm verify the owner.
    Exclusive(ActivityId),
    /// Bound to several Activities; all are notified on fire.
    Shared(Vec<ActivityId>),
}

/// An armed or latched trigger.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub binding: TriggerBinding,
    pub method: String,
    pub params: Value,
    pub matcher: TriggerMatcher,
    armed: bool,
    triggered: bool,
}

impl Trigger {
    pub fn exclusive(owner: ActivityId, spec: &TriggerSpec) -> Self {
        Self {
            binding: TriggerBinding::Exclusive(owner),
            method: spec.method.clone(),
            params: spec.params.clone(),
            matcher: spec.matcher(),
            armed: false,
            triggered: false,
        }
    }

    pub fn shared(owners: Vec<ActivityId>, spec: &TriggerSpec) -> Self {
        Self {
            binding: TriggerBinding::Shared(owners),
            method: spec.method.clone(),
            params: spec.params.clone(),
            matcher: spec.matcher(),
            armed: false,
            triggered: false,
        }
    }

    fn check_owner(&self, caller: ActivityId) -> Result<(), AmError> {
        match &self.binding {
            TriggerBinding::Exclusive(owner) if *owner != caller => Err(AmError::wrong_owner(
                format!("trigger belongs to activity {owner}, not {caller}"),
            )),
            _ => Ok(()),
        }
    }

    /// Open the event-source subscription. Re-arming resets the latch.
    pub fn arm(&mut self, caller: ActivityId, fx: &mut Fx) -> Result<(), AmError> {
        self.check_owner(caller)?;
        if self.armed {
            return Ok(());
        }
        self.armed = true;
        self.triggered = false;
        fx.push(Effect::TriggerSubscribe {
            activity_id: caller,
            method: self.method.clone(),
            params: self.params.clone(),
        });
        Ok(())
    }

    /// Close the subscription without firing.
    pub fn disarm(&mut self, caller: ActivityId, fx: &mut Fx) -> Result<(), AmError> {
        self.check_owner(caller)?;
        if self.armed {
            self.armed = false;
            fx.push(Effect::TriggerCancel { activity_id: caller });
        }
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Feed a subscription response through the matcher. On match, latch,
    /// drop the subscription, and report the owners to notify.
    pub fn on_response(
        &mut self,
        activity_id: ActivityId,
        response: &Value,
        fx: &mut Fx,
    ) -> Vec<ActivityId> {
        if !self.armed || !self.matcher.matches(response) {
            return Vec::new();
        }
        self.armed = false;
        self.triggered = true;
        fx.push(Effect::TriggerCancel { activity_id });
        match &self.binding {
            TriggerBinding::Exclusive(owner) => vec![*owner],
            TriggerBinding::Shared(owners) => owners.clone(),
        }
    }

    /// Drop a shared owner (on release); exclusive bindings are unaffected.
    pub fn drop_owner(&mut self, id: ActivityId) {
        if let TriggerBinding::Shared(owners) = &mut self.binding {
            owners.retain(|o| *o != id);
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
