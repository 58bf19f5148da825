// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity and registry: the id table and the `(name, creator)` table.
//!
//! Ids are capability-like random 64-bit handles by default; debug builds may
//! switch to monotonic allocation for reproducibility. Id 0 is reserved.

use std::collections::{BTreeMap, HashMap};

use am_core::{ActivityId, AmError, BusId};

use crate::model::activity::Activity;

/// Allocation policy for new ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAllocation {
    Random,
    Monotonic,
}

/// The live Activity set plus both lookup tables.
#[derive(Debug)]
pub struct Registry {
    activities: HashMap<ActivityId, Activity>,
    /// Registered, non-ending Activities by `(name, creator)`.
    names: BTreeMap<(String, BusId), ActivityId>,
    allocation: IdAllocation,
    next_id: u64,
}

impl Registry {
    pub fn new(allocation: IdAllocation) -> Self {
        Self { activities: HashMap::new(), names: BTreeMap::new(), allocation, next_id: 1 }
    }

    /// Allocate an unused id. Retries on collision with any instantiated
    /// Activity, including those still tearing down.
    pub fn allocate_id(&mut self) -> ActivityId {
        match self.allocation {
            IdAllocation::Random => loop {
                let id = ActivityId::random();
                if id.0 != 0 && !self.activities.contains_key(&id) {
                    return id;
                }
            },
            IdAllocation::Monotonic => loop {
                let id = ActivityId(self.next_id);
                self.next_id = self.next_id.wrapping_add(1).max(1);
                if !self.activities.contains_key(&id) {
                    return id;
                }
            },
        }
    }

    /// Insert a new Activity under its id. The name is registered separately
    /// once creation is past the point of no return.
    pub fn insert(&mut self, activity: Activity) {
        tracing::debug!(activity = %activity.id, name = activity.name(), "activity allocated");
        self.activities.insert(activity.id, activity);
    }

    /// Claim the Activity's `(name, creator)` key. The most recent claimant
    /// wins; the previous holder must have been unregistered first.
    pub fn register_name(&mut self, id: ActivityId) {
        if let Some(act) = self.activities.get_mut(&id) {
            act.name_registered = true;
            let key = (act.spec.name.clone(), act.creator.clone());
            self.names.insert(key, id);
        }
    }

    /// Release the name if this Activity still holds it.
    pub fn unregister_name(&mut self, id: ActivityId) {
        let Some(act) = self.activities.get_mut(&id) else {
            return;
        };
        act.name_registered = false;
        let key = (act.spec.name.clone(), act.creator.clone());
        if self.names.get(&key) == Some(&id) {
            self.names.remove(&key);
        }
    }

    /// Drop the Activity entirely. The name is released as a side effect if
    /// still held.
    pub fn remove(&mut self, id: ActivityId) -> Option<Activity> {
        self.unregister_name(id);
        self.activities.remove(&id)
    }

    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    pub fn get_mut(&mut self, id: ActivityId) -> Option<&mut Activity> {
        self.activities.get_mut(&id)
    }

    pub fn require(&self, id: ActivityId) -> Result<&Activity, AmError> {
        self.get(id).ok_or_else(|| AmError::not_found(format!("activity {id} not found")))
    }

    pub fn require_mut(&mut self, id: ActivityId) -> Result<&mut Activity, AmError> {
        self.activities
            .get_mut(&id)
            .ok_or_else(|| AmError::not_found(format!("activity {id} not found")))
    }

    /// Look up by `(name, creator)`. Anonymous creators match on name alone.
    pub fn find_by_name(&self, name: &str, creator: &BusId) -> Option<ActivityId> {
        if creator.is_anonymous() {
            self.names
                .range((name.to_string(), BusId::App(String::new()))..)
                .take_while(|((n, _), _)| n == name)
                .map(|(_, id)| *id)
                .next()
        } else {
            self.names.get(&(name.to_string(), creator.clone())).copied()
        }
    }

    pub fn ids(&self) -> Vec<ActivityId> {
        self.activities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
