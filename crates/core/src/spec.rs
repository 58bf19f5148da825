// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The declarative Activity specification.
//!
//! This is the document clients send on `create` and the document the store
//! persists: everything needed to reconstruct an Activity after reboot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::BusType;
use crate::error::AmError;
use crate::matcher::{TriggerMatcher, WhereClause};
use crate::priority::ActivityPriority;
use crate::schedule::ScheduleSpec;

/// The RPC the manager invokes once the Activity is permitted to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallbackSpec {
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// Trigger declaration: an event-source subscription plus a matcher.
///
/// Matcher precedence when several keys are present: `where` > `compare` >
/// `key` > any-response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<CompareSpec>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_: Option<Vec<WhereClause>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareSpec {
    pub key: String,
    pub value: Value,
}

impl TriggerSpec {
    pub fn matcher(&self) -> TriggerMatcher {
        if let Some(clauses) = &self.where_ {
            TriggerMatcher::Where(clauses.clone())
        } else if let Some(cmp) = &self.compare {
            TriggerMatcher::Compare { key: cmp.key.clone(), value: cmp.value.clone() }
        } else if let Some(key) = &self.key {
            TriggerMatcher::Key(key.clone())
        } else {
            TriggerMatcher::Any
        }
    }
}

/// Resolved type flags of an Activity.
///
/// Clients may write the simple aliases `foreground` (= immediate, normal
/// priority) or `background` (= not immediate, low priority) instead of
/// spelling out `immediate` + `priority`; mixing the two forms is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityType {
    pub immediate: bool,
    pub priority: ActivityPriority,
    pub persistent: bool,
    pub explicit: bool,
    pub continuous: bool,
    pub user_initiated: bool,
    pub power: bool,
    pub power_debounce: bool,
    pub bus: BusType,
}

impl Default for ActivityType {
    fn default() -> Self {
        Self {
            immediate: false,
            priority: ActivityPriority::Normal,
            persistent: false,
            explicit: false,
            continuous: false,
            user_initiated: false,
            power: false,
            power_debounce: false,
            bus: BusType::Private,
        }
    }
}

impl ActivityType {
    /// True when the flags collapse to the `foreground` alias.
    pub fn is_foreground(&self) -> bool {
        self.immediate && self.priority == ActivityPriority::Normal
    }

    /// True when the flags collapse to the `background` alias.
    pub fn is_background(&self) -> bool {
        !self.immediate && self.priority == ActivityPriority::Low
    }
}

/// Raw wire form of the type block.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct TypeBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    foreground: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    immediate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<ActivityPriority>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    persist: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    explicit: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    continuous: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    user_initiated: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    power: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    power_debounce: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bus: Option<BusType>,
}

impl TryFrom<TypeBlock> for ActivityType {
    type Error = String;

    fn try_from(raw: TypeBlock) -> Result<Self, String> {
        let alias = raw.foreground.is_some() || raw.background.is_some();
        if alias && (raw.immediate.is_some() || raw.priority.is_some()) {
            return Err("may not combine foreground/background with immediate/priority".into());
        }
        if raw.foreground.is_some() && raw.background.is_some() {
            return Err("may not set both foreground and background".into());
        }
        let (immediate, priority) = if raw.foreground == Some(true) {
            (true, ActivityPriority::Normal)
        } else if raw.background == Some(true) {
            (false, ActivityPriority::Low)
        } else {
            (raw.immediate.unwrap_or(false), raw.priority.unwrap_or_default())
        };
        if raw.continuous && !immediate {
            return Err("continuous activities must be immediate".into());
        }
        if raw.power_debounce && !raw.power {
            return Err("powerDebounce requires power".into());
        }
        Ok(ActivityType {
            immediate,
            priority,
            persistent: raw.persist,
            explicit: raw.explicit,
            continuous: raw.continuous,
            user_initiated: raw.user_initiated,
            power: raw.power,
            power_debounce: raw.power_debounce,
            bus: raw.bus.unwrap_or_default(),
        })
    }
}

impl From<&ActivityType> for TypeBlock {
    fn from(t: &ActivityType) -> Self {
        let mut raw = TypeBlock {
            persist: t.persistent,
            explicit: t.explicit,
            continuous: t.continuous,
            user_initiated: t.user_initiated,
            power: t.power,
            power_debounce: t.power_debounce,
            bus: (t.bus != BusType::Private).then_some(t.bus),
            ..TypeBlock::default()
        };
        // Prefer the simple alias when the flags round-trip through it.
        if t.is_foreground() {
            raw.foreground = Some(true);
        } else if t.is_background() {
            raw.background = Some(true);
        } else {
            raw.immediate = Some(t.immediate);
            raw.priority = Some(t.priority);
        }
        raw
    }
}

impl Serialize for ActivityType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        TypeBlock::from(self).serialize(s)
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = TypeBlock::deserialize(d)?;
        ActivityType::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// The full declarative Activity specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerSpec>,
    /// Requirement name → desired value (usually `true`).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub requirements: IndexMap<String, Value>,
    /// Opaque blob returned to clients verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ActivitySpec {
    /// Structural validation; registry-level checks (name uniqueness,
    /// requirement availability) happen at creation time.
    pub fn validate(&self) -> Result<(), AmError> {
        if self.name.is_empty() {
            return Err(AmError::invalid_argument("activity name must be non-empty"));
        }
        if let Some(schedule) = &self.schedule {
            schedule.validate().map_err(AmError::invalid_argument)?;
        }
        if let Some(metadata) = &self.metadata {
            if !metadata.is_object() {
                return Err(AmError::invalid_argument("metadata must be an object"));
            }
        }
        if let Some(cb) = &self.callback {
            if cb.method.is_empty() {
                return Err(AmError::invalid_argument("callback method must be non-empty"));
            }
        }
        if let Some(trigger) = &self.trigger {
            if trigger.method.is_empty() {
                return Err(AmError::invalid_argument("trigger method must be non-empty"));
            }
        }
        Ok(())
    }
}

crate::builder! {
    pub struct SpecBuilderInner => ActivitySpec {
        into {
            name: String = "test-activity",
            description: String = "",
        }
        set {
            activity_type: ActivityType = ActivityType::default(),
            requirements: IndexMap<String, Value> = IndexMap::new(),
        }
        option {
            callback: CallbackSpec = None,
            schedule: ScheduleSpec = None,
            trigger: TriggerSpec = None,
            metadata: Value = None,
        }
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
