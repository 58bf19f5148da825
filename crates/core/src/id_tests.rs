// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

// --- ActivityId tests ---

#[test]
fn activity_id_random_is_unique() {
    let a = ActivityId::random();
    let b = ActivityId::random();
    assert_ne!(a, b);
}

#[test]
fn activity_id_display_is_decimal() {
    assert_eq!(ActivityId(42).to_string(), "42");
}

#[test]
fn activity_id_serde_transparent() {
    let id = ActivityId(7);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "7");
    let back: ActivityId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

// --- define_id! macro tests ---

#[test]
fn subscription_id_carries_prefix() {
    let id = SubscriptionId::new();
    assert!(id.as_str().starts_with("sub-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn cmd_id_hash_map_lookup_by_str() {
    let mut map = HashMap::new();
    let id = CmdId::from_string("cmd-abc");
    map.insert(id, 42);
    assert_eq!(map.get("cmd-abc"), Some(&42));
}

#[test]
fn id_round_trips_through_serde() {
    let id = SubscriptionId::new();
    let json = serde_json::to_string(&id).unwrap();
    let back: SubscriptionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

// --- IdBuf tests ---

#[test]
fn id_buf_rejects_oversized_on_deserialize() {
    let long = format!("\"{}\"", "x".repeat(ID_MAX_LEN + 1));
    let res: Result<IdBuf, _> = serde_json::from_str(&long);
    assert!(res.is_err());
}

#[test]
fn id_buf_empty() {
    let buf = IdBuf::new("");
    assert!(buf.is_empty());
    assert_eq!(buf.as_str(), "");
}
