// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The requirement model.
//!
//! Providers register named cores at startup; each Activity that names a
//! requirement holds a thin wrapper comparing the core's current value with
//! the Activity's desired value. Core value changes fan out to every owner.

use serde_json::Value;
use std::collections::HashMap;

use am_core::AmError;

/// Per-Activity requirement wrapper.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: String,
    pub desired: Value,
    pub met: bool,
    /// Last value the provider reported, for detail queries.
    pub current: Value,
}

impl Requirement {
    /// Whether `current` satisfies `desired`.
    ///
    /// A boolean desired value compares against the truthiness of the
    /// current value; anything else requires equality.
    pub fn satisfies(desired: &Value, current: &Value) -> bool {
        match desired {
            Value::Bool(want) => current.as_bool().unwrap_or(false) == *want,
            other => other == current,
        }
    }
}

/// Provider-side shared state of one named requirement.
#[derive(Debug, Clone)]
pub struct RequirementCore {
    pub name: String,
    pub current: Value,
}

/// Registry of requirement providers.
///
/// Instantiation of a name no provider registered fails with
/// `UnknownRequirement`.
#[derive(Debug, Default)]
pub struct RequirementManager {
    cores: HashMap<String, RequirementCore>,
}

impl RequirementManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider-backed requirement name with its initial value.
    pub fn register(&mut self, name: impl Into<String>, initial: Value) {
        let name = name.into();
        tracing::debug!(requirement = %name, "requirement registered");
        self.cores.insert(name.clone(), RequirementCore { name, current: initial });
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.cores.contains_key(name)
    }

    /// Instantiate a per-Activity wrapper for `name` with `desired`.
    pub fn instantiate(&self, name: &str, desired: &Value) -> Result<Requirement, AmError> {
        let core = self.cores.get(name).ok_or_else(|| AmError::unknown_requirement(name))?;
        Ok(Requirement {
            name: core.name.clone(),
            desired: desired.clone(),
            met: Requirement::satisfies(desired, &core.current),
            current: core.current.clone(),
        })
    }

    /// Record a provider update; returns the previous value, or None for an
    /// unregistered name (ignored with a warning at the caller).
    pub fn update(&mut self, name: &str, value: Value) -> Option<Value> {
        let core = self.cores.get_mut(name)?;
        let prev = std::mem::replace(&mut core.current, value);
        Some(prev)
    }

    pub fn current(&self, name: &str) -> Option<&Value> {
        self.cores.get(name).map(|c| &c.current)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cores.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "requirement_tests.rs"]
mod tests;
