//! JSON file-per-record durable backend.
//!
//! Each namespace is a directory under the state root; each record is a
//! self-contained `{id}.json` file. Writes go to a temp file and are
//! renamed into place so a crash never leaves a torn record.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::RecordStore;
use crate::error::{CoreError, CoreResult};

/// File-backed implementation of [`RecordStore`].
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Open (and create if needed) a store rooted at the given
    /// directory.
    pub async fn new(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| CoreError::storage_io("creating state root", e))?;
        info!(root = %root.display(), "file record store initialized");
        Ok(Self { root })
    }

    /// The state root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, namespace: &str, id: &str) -> CoreResult<PathBuf> {
        validate_segment("namespace", namespace, true)?;
        validate_segment("id", id, false)?;
        Ok(self.root.join(namespace).join(format!("{}.json", id)))
    }
}

/// Reject segments that would escape the state root.
fn validate_segment(what: &str, value: &str, allow_slash: bool) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::validation(format!("{} must not be empty", what)));
    }
    let bad_slash = !allow_slash && (value.contains('/') || value.contains('\\'));
    if bad_slash || value.split(['/', '\\']).any(|part| part == ".." || part.is_empty()) {
        return Err(CoreError::validation(format!(
            "{} contains an invalid path segment: {}",
            what, value
        )));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn put(&self, namespace: &str, id: &str, record: &serde_json::Value) -> CoreResult<()> {
        let path = self.record_path(namespace, id)?;
        let dir = path.parent().expect("record path always has a parent");
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CoreError::storage_io(format!("creating namespace {}", namespace), e))?;

        let body = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| CoreError::storage_io(format!("writing {}/{}", namespace, id), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CoreError::storage_io(format!("committing {}/{}", namespace, id), e))?;

        debug!(namespace, id, bytes = body.len(), "record persisted");
        Ok(())
    }

    async fn get(&self, namespace: &str, id: &str) -> CoreResult<Option<serde_json::Value>> {
        let path = self.record_path(namespace, id)?;
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::storage_io(
                    format!("reading {}/{}", namespace, id),
                    e,
                ))
            }
        };
        let value = serde_json::from_str(&body)?;
        Ok(Some(value))
    }

    async fn list_ids(&self, namespace: &str) -> CoreResult<Vec<String>> {
        validate_segment("namespace", namespace, true)?;
        let dir = self.root.join(namespace);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CoreError::storage_io(
                    format!("listing namespace {}", namespace),
                    e,
                ))
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| CoreError::storage_io(format!("listing namespace {}", namespace), e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    async fn list(&self, namespace: &str) -> CoreResult<Vec<serde_json::Value>> {
        let mut records = Vec::new();
        for id in self.list_ids(namespace).await? {
            if let Some(record) = self.get(namespace, &id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn remove(&self, namespace: &str, id: &str) -> CoreResult<()> {
        let path = self.record_path(namespace, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::storage_io(
                format!("removing {}/{}", namespace, id),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> (tempfile::TempDir, FileRecordStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path()).await.expect("store");
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, store) = store().await;
        let record = json!({"id": "e1", "name": "AuthService"});

        store.put("entities", "e1", &record).await.unwrap();
        let read = store.get("entities", "e1").await.unwrap();
        assert_eq!(read, Some(record));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_dir, store) = store().await;
        assert_eq!(store.get("entities", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_ids() {
        let (_dir, store) = store().await;
        store.put("chains", "c1", &json!({})).await.unwrap();
        store.put("chains", "c2", &json!({})).await.unwrap();

        let mut ids = store.list_ids("chains").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert!(store.list_ids("empty-ns").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nested_namespace() {
        let (_dir, store) = store().await;
        store
            .put("checkpoints/sess-1", "cp-1", &json!({"n": 1}))
            .await
            .unwrap();
        let read = store.get("checkpoints/sess-1", "cp-1").await.unwrap();
        assert_eq!(read, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_rejects_path_escape() {
        let (_dir, store) = store().await;
        let err = store.get("entities", "../secrets").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let err = store.get("..", "x").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, store) = store().await;
        store.put("entities", "e1", &json!({})).await.unwrap();
        store.remove("entities", "e1").await.unwrap();
        store.remove("entities", "e1").await.unwrap();
        assert_eq!(store.get("entities", "e1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_record_surfaces_parse_error() {
        let (dir, store) = store().await;
        let ns = dir.path().join("entities");
        std::fs::create_dir_all(&ns).unwrap();
        std::fs::write(ns.join("bad.json"), "{not json").unwrap();

        let err = store.get("entities", "bad").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Serialization);
    }
}
