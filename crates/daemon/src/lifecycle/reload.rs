// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reload persisted Activities at boot.
//!
//! One document per persistent Activity: the declarative spec plus
//! `activityId`, `creator`, `_id`, and `_rev`. Id and name collisions keep
//! the higher revision; losers are purged from the store, not just dropped.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use am_core::{ActivityCommand, ActivityId, ActivitySpec, BusId};

use crate::engine::effect::Fx;
use crate::model::activity::Activity;
use crate::model::persist::PersistToken;
use crate::model::EngineState;

/// One parsed store document.
struct LoadedDoc {
    doc_id: String,
    rev: u64,
    activity_id: ActivityId,
    creator: BusId,
    spec: ActivitySpec,
}

fn parse_doc(doc_id: &str, rev: u64, doc: &Value) -> Option<LoadedDoc> {
    let activity_id = doc.get("activityId").and_then(Value::as_u64).map(ActivityId)?;
    let creator = doc.get("creator").and_then(Value::as_str).map(BusId::parse)?;
    let mut spec_value = doc.clone();
    if let Value::Object(map) = &mut spec_value {
        map.remove("_id");
        map.remove("_rev");
        map.remove("activityId");
        map.remove("creator");
    }
    let spec: ActivitySpec = match serde_json::from_value(spec_value) {
        Ok(spec) => spec,
        Err(err) => {
            tracing::warn!(doc_id = %doc_id, error = %err, "skipping unparsable activity document");
            return None;
        }
    };
    Some(LoadedDoc { doc_id: doc_id.to_string(), rev, activity_id, creator, spec })
}

/// Rebuild the registry from store documents.
///
/// Returns the document ids of collision losers, which the caller deletes
/// from the store.
pub fn load_persisted(
    state: &mut EngineState,
    docs: Vec<(String, u64, Value)>,
    now: DateTime<Utc>,
    fx: &mut Fx,
) -> Vec<String> {
    let mut purge = Vec::new();

    // Winner per id, then per name: higher revision survives.
    let mut by_id: HashMap<ActivityId, LoadedDoc> = HashMap::new();
    for (doc_id, rev, doc) in &docs {
        let Some(loaded) = parse_doc(doc_id, *rev, doc) else {
            continue;
        };
        match by_id.get(&loaded.activity_id) {
            Some(existing) if existing.rev >= loaded.rev => {
                tracing::warn!(doc_id = %doc_id, activity = %loaded.activity_id, "purging lower-revision id duplicate");
                purge.push(loaded.doc_id);
            }
            Some(existing) => {
                tracing::warn!(doc_id = %existing.doc_id, activity = %loaded.activity_id,
                    "purging lower-revision id duplicate");
                purge.push(existing.doc_id.clone());
                by_id.insert(loaded.activity_id, loaded);
            }
            None => {
                by_id.insert(loaded.activity_id, loaded);
            }
        }
    }

    let mut by_name: HashMap<(String, BusId), LoadedDoc> = HashMap::new();
    for (_, loaded) in by_id.drain() {
        let key = (loaded.spec.name.clone(), loaded.creator.clone());
        match by_name.get(&key) {
            Some(existing) if existing.rev >= loaded.rev => {
                tracing::warn!(doc_id = %loaded.doc_id, name = %key.0, "purging lower-revision name duplicate");
                purge.push(loaded.doc_id);
            }
            Some(existing) => {
                tracing::warn!(doc_id = %existing.doc_id, name = %key.0, "purging lower-revision name duplicate");
                purge.push(existing.doc_id.clone());
                by_name.insert(key, loaded);
            }
            None => {
                by_name.insert(key, loaded);
            }
        }
    }

    for (_, loaded) in by_name {
        let LoadedDoc { doc_id, rev, activity_id, creator, spec } = loaded;
        let mut act = Activity::new(activity_id, spec, creator);
        if let Err(err) = state.instantiate_gating(&mut act) {
            tracing::warn!(activity = %activity_id, error = %err, "cannot restore activity, purging");
            purge.push(doc_id);
            continue;
        }
        act.persist_token = Some(PersistToken { doc_id: Some(doc_id), rev: Some(rev) });
        tracing::info!(activity = %activity_id, name = act.name(), "restored persistent activity");
        state.registry.insert(act);
        state.registry.register_name(activity_id);

        // Restored Activities resume from the top of the FSM; with the gates
        // still shut they park in the initialized queue.
        if let Err(err) = state.send_command(activity_id, ActivityCommand::Start, false, now, fx) {
            tracing::warn!(activity = %activity_id, error = %err, "failed to start restored activity");
        }
    }

    purge
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
