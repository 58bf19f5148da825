// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::PersistStore;
use serde_json::json;

fn store() -> (FileStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("store")).unwrap();
    (store, dir)
}

#[tokio::test]
async fn put_allocates_id_and_bumps_revision() {
    let (store, _dir) = store();
    let (doc_id, rev) = store.put(None, None, json!({"name": "a"})).await.unwrap();
    assert_eq!(rev, 1);

    let (same_id, rev2) = store.put(Some(doc_id.clone()), Some(rev), json!({"name": "a2"})).await.unwrap();
    assert_eq!(same_id, doc_id);
    assert_eq!(rev2, 2);
}

#[tokio::test]
async fn load_all_round_trips_documents() {
    let (store, _dir) = store();
    store.put(None, None, json!({"name": "a"})).await.unwrap();
    store.put(None, None, json!({"name": "b"})).await.unwrap();

    let docs = store.load_all().await.unwrap();
    assert_eq!(docs.len(), 2);
    let mut names: Vec<String> =
        docs.iter().map(|(_, _, d)| d["name"].as_str().unwrap().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
    // The stored documents carry their own id and revision.
    for (doc_id, rev, doc) in docs {
        assert_eq!(doc["_id"], doc_id.as_str());
        assert_eq!(doc["_rev"].as_u64().unwrap(), rev);
    }
}

#[tokio::test]
async fn del_removes_and_tolerates_missing() {
    let (store, _dir) = store();
    let (doc_id, _) = store.put(None, None, json!({"name": "a"})).await.unwrap();
    store.del(doc_id.clone(), None).await.unwrap();
    assert!(store.load_all().await.unwrap().is_empty());
    // Deleting again is as good as deleted.
    store.del(doc_id, None).await.unwrap();
}

#[tokio::test]
async fn corrupt_documents_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().join("store");
    let store = FileStore::new(store_dir.clone()).unwrap();
    store.put(None, None, json!({"name": "good"})).await.unwrap();
    std::fs::write(store_dir.join("bad.json"), b"{not json").unwrap();

    let docs = store.load_all().await.unwrap();
    assert_eq!(docs.len(), 1);
}
