// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority and resource binding.
//!
//! Subscribers are grouped into bus entities; entities map into resource
//! containers (one per OS container). An Activity contributes its
//! `(priority, focused)` pair to each entity it is associated with; effective
//! values are the max across contributors, and only changes reach the OS
//! controls.

use std::collections::{HashMap, HashSet};

use am_core::{ActivityId, ActivityPriority, BusId};

use crate::engine::effect::{Effect, Fx};

/// One bus identity's view of its associated Activities.
#[derive(Debug, Default)]
pub struct BusEntity {
    /// Activity → (priority, focused) contribution.
    associations: HashMap<ActivityId, (ActivityPriority, bool)>,
    /// Container this entity currently lives in, if mapped.
    container: Option<String>,
}

impl BusEntity {
    /// Effective contribution: max priority, focused if any contributor is.
    pub fn effective(&self) -> (ActivityPriority, bool) {
        let mut priority = ActivityPriority::Lowest;
        let mut focused = false;
        for (p, f) in self.associations.values() {
            priority = priority.max(*p);
            focused |= *f;
        }
        (priority, focused)
    }

    pub fn is_idle(&self) -> bool {
        self.associations.is_empty()
    }
}

/// One OS-level container and the entities mapped into it.
#[derive(Debug, Default)]
pub struct ResourceContainer {
    pub entities: HashSet<BusId>,
    /// Last `(priority, focused)` pushed to the OS controls.
    pub applied: Option<(ActivityPriority, bool)>,
}

/// The binder: entities, containers, and the process mapping.
#[derive(Debug, Default)]
pub struct ResourceManager {
    entities: HashMap<BusId, BusEntity>,
    containers: HashMap<String, ResourceContainer>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate one Activity contribution with one subscriber identity.
    pub fn associate(
        &mut self,
        activity_id: ActivityId,
        priority: ActivityPriority,
        focused: bool,
        subscriber: &BusId,
        fx: &mut Fx,
    ) {
        let entity = self.entities.entry(subscriber.clone()).or_default();
        entity.associations.insert(activity_id, (priority, focused));
        self.refresh_container_of(subscriber, fx);
    }

    /// Drop one Activity's contribution from one identity.
    pub fn dissociate(&mut self, activity_id: ActivityId, subscriber: &BusId, fx: &mut Fx) {
        let Some(entity) = self.entities.get_mut(subscriber) else {
            return;
        };
        entity.associations.remove(&activity_id);
        if entity.is_idle() && entity.container.is_none() {
            self.entities.remove(subscriber);
            return;
        }
        self.refresh_container_of(subscriber, fx);
    }

    /// Drop an Activity's contribution from every entity (end of run).
    pub fn dissociate_all(&mut self, activity_id: ActivityId, fx: &mut Fx) {
        let holders: Vec<BusId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.associations.contains_key(&activity_id))
            .map(|(id, _)| id.clone())
            .collect();
        for subscriber in holders {
            self.dissociate(activity_id, &subscriber, fx);
        }
    }

    /// Refresh an Activity's contribution after a priority/focus change.
    pub fn update_contribution(
        &mut self,
        activity_id: ActivityId,
        priority: ActivityPriority,
        focused: bool,
        fx: &mut Fx,
    ) {
        let holders: Vec<BusId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.associations.contains_key(&activity_id))
            .map(|(id, _)| id.clone())
            .collect();
        for subscriber in holders {
            self.associate(activity_id, priority, focused, &subscriber, fx);
        }
    }

    /// Bind a process to a container: move each entity (preserving its
    /// associations) and write the pid into the container's task list.
    pub fn map_process(&mut self, container: &str, ids: &[BusId], pid: u32, fx: &mut Fx) {
        self.containers.entry(container.to_string()).or_default();
        for id in ids {
            let entity = self.entities.entry(id.clone()).or_default();
            let previous = entity.container.replace(container.to_string());
            if let Some(prev) = previous {
                if prev != container {
                    if let Some(c) = self.containers.get_mut(&prev) {
                        c.entities.remove(id);
                    }
                    self.refresh_container(&prev, fx);
                }
            }
            if let Some(c) = self.containers.get_mut(container) {
                c.entities.insert(id.clone());
            }
        }
        fx.push(Effect::ContainerMapPid { container: container.to_string(), pid });
        self.refresh_container(container, fx);
    }

    fn refresh_container_of(&mut self, subscriber: &BusId, fx: &mut Fx) {
        let container = self.entities.get(subscriber).and_then(|e| e.container.clone());
        if let Some(name) = container {
            self.refresh_container(&name, fx);
        }
    }

    /// Recompute a container's effective priority and push it if changed.
    fn refresh_container(&mut self, name: &str, fx: &mut Fx) {
        let Some(container) = self.containers.get(name) else {
            return;
        };
        let mut priority = ActivityPriority::Lowest;
        let mut focused = false;
        for entity_id in &container.entities {
            if let Some(entity) = self.entities.get(entity_id) {
                let (p, f) = entity.effective();
                priority = priority.max(p);
                focused |= f;
            }
        }
        let next = (priority, focused);
        if let Some(container) = self.containers.get_mut(name) {
            if container.applied == Some(next) {
                return;
            }
            container.applied = Some(next);
        }
        fx.push(Effect::ContainerApply { container: name.to_string(), priority, focused });
    }

    /// Snapshot for the `info` dump: container → (priority, focused).
    pub fn snapshot(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, c) in &self.containers {
            let (p, f) = c.applied.unwrap_or((ActivityPriority::Lowest, false));
            map.insert(
                name.clone(),
                serde_json::json!({"priority": p, "focused": f, "entities": c.entities.len()}),
            );
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
