// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file document store.
//!
//! The in-tree stand-in for the device's document store: one file per
//! Activity document under the store directory, named `{doc_id}.json`, with
//! the revision embedded. Writes go through a temp file and rename so a
//! crash never leaves a torn document.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use super::{PersistStore, TransportError};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{doc_id}.json"))
    }

    fn io_err(err: std::io::Error) -> TransportError {
        // Local filesystem errors are not going to heal on retry.
        TransportError::Permanent(err.to_string())
    }
}

#[async_trait]
impl PersistStore for FileStore {
    async fn put(
        &self,
        doc_id: Option<String>,
        rev: Option<u64>,
        mut doc: Value,
    ) -> Result<(String, u64), TransportError> {
        let doc_id = doc_id.unwrap_or_else(|| nanoid::nanoid!(16));
        let rev = rev.unwrap_or(0) + 1;
        if let Value::Object(map) = &mut doc {
            map.insert("_id".into(), Value::String(doc_id.clone()));
            map.insert("_rev".into(), serde_json::json!(rev));
        }
        let path = self.path_for(&doc_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| TransportError::Permanent(e.to_string()))?;
        tokio::fs::write(&tmp, bytes).await.map_err(Self::io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(Self::io_err)?;
        tracing::debug!(doc_id = %doc_id, rev, "document stored");
        Ok((doc_id, rev))
    }

    async fn del(&self, doc_id: String, _rev: Option<u64>) -> Result<(), TransportError> {
        let path = self.path_for(&doc_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(doc_id = %doc_id, "document deleted");
                Ok(())
            }
            // Already gone is as good as deleted.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_err(err)),
        }
    }

    async fn load_all(&self) -> Result<Vec<(String, u64, Value)>, TransportError> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(Self::io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(Self::io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable document");
                    continue;
                }
            };
            let doc: Value = match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping corrupt document");
                    continue;
                }
            };
            let doc_id = doc
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
                });
            let rev = doc.get("_rev").and_then(Value::as_u64).unwrap_or(0);
            out.push((doc_id, rev, doc));
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
