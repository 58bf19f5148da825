// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and helpers shared across crates' tests.
//!
//! Gated behind `test-support`; nothing here is compiled into release builds.

use serde_json::{json, Value};

use crate::bus::BusId;
use crate::priority::ActivityPriority;
use crate::spec::{ActivitySpec, ActivityType, CallbackSpec, CompareSpec, TriggerSpec};

pub use crate::spec::SpecBuilderInner as SpecBuilder;

/// `{immediate, normal}` type flags.
pub fn foreground_type() -> ActivityType {
    ActivityType { immediate: true, priority: ActivityPriority::Normal, ..ActivityType::default() }
}

/// `{not-immediate, low}` type flags.
pub fn background_type() -> ActivityType {
    ActivityType { immediate: false, priority: ActivityPriority::Low, ..ActivityType::default() }
}

/// Minimal foreground spec with a callback, the common create payload.
pub fn callback_spec(name: &str) -> ActivitySpec {
    ActivitySpec::builder()
        .name(name)
        .activity_type(foreground_type())
        .callback(CallbackSpec { method: "test.service/run".into(), params: Value::Null })
        .build()
}

/// Background spec gated on a single boolean requirement.
pub fn requirement_spec(name: &str, requirement: &str) -> ActivitySpec {
    let mut spec = ActivitySpec::builder().name(name).activity_type(background_type()).build();
    spec.requirements.insert(requirement.to_string(), Value::Bool(true));
    spec
}

/// Trigger spec matching `{ "fired": true }` responses.
pub fn fired_trigger() -> TriggerSpec {
    TriggerSpec {
        method: "test.source/subscribe".into(),
        params: Value::Null,
        key: None,
        compare: Some(CompareSpec { key: "fired".into(), value: json!(true) }),
        where_: None,
    }
}

/// A deterministic app identity for tests.
pub fn test_app(n: u32) -> BusId {
    BusId::app(format!("com.test.app{n}"))
}
