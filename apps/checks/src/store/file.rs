//! File-backed record store: one JSON file per record.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{RecordStore, StoreError};

const EXTENSION: &str = "json";

type RecordKey = (String, String);

/// Stores `<collection>/<id>.json` under a base directory
pub struct FileStore {
    base_dir: PathBuf,
    /// Per-record write locks, present only while a write is pending
    locks: Mutex<HashMap<RecordKey, Arc<Mutex<()>>>>,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_segment(collection)?;
        validate_segment(id)?;
        Ok(self.base_dir.join(collection).join(format!("{id}.{EXTENSION}")))
    }

    /// Run `op` holding the record's write lock
    async fn with_lock<T>(&self, collection: &str, id: &str, op: impl Future<Output = T>) -> T {
        let key = (collection.to_string(), id.to_string());
        let lock = Arc::clone(self.locks.lock().await.entry(key.clone()).or_default());

        let result = {
            let _guard = lock.lock().await;
            op.await
        };

        // Only the map and this task hold the lock: nobody is waiting on it.
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
        result
    }
}

/// Ids and collections become path segments
fn validate_segment(segment: &str) -> Result<(), StoreError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0']);
    if valid { Ok(()) } else { Err(StoreError::InvalidId(segment.to_string())) }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound { collection: collection.to_string(), id: id.to_string() }
}

/// Parsed record, `None` when the file does not exist
async fn read_record(path: &Path) -> Result<Option<Value>, StoreError> {
    match fs::read(path).await {
        Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_new(path: &Path, body: &[u8]) -> Result<bool, StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(body).await?;
    file.sync_all().await?;
    Ok(true)
}

/// Replace through a rename so readers never see a half-written record
async fn replace(path: &Path, body: &[u8]) -> Result<(), StoreError> {
    let staging = path.with_extension(format!("{EXTENSION}.tmp"));
    let mut file = fs::File::create(&staging).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&staging, path).await?;
    Ok(())
}

async fn replace_existing(path: &Path, body: &[u8]) -> Result<bool, StoreError> {
    if !fs::try_exists(path).await? {
        return Ok(false);
    }
    replace(path, body).await?;
    Ok(true)
}

enum Merged {
    Written,
    Missing,
    NotAnObject,
}

async fn merge_fields(path: &Path, fields: &Map<String, Value>) -> Result<Merged, StoreError> {
    let Some(mut document) = read_record(path).await? else {
        return Ok(Merged::Missing);
    };
    let Value::Object(stored) = &mut document else {
        return Ok(Merged::NotAnObject);
    };
    for (name, value) in fields {
        stored.insert(name.clone(), value.clone());
    }

    replace(path, &serde_json::to_vec(&document)?).await?;
    Ok(Merged::Written)
}

#[async_trait]
impl RecordStore for FileStore {
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        validate_segment(collection)?;
        let dir = self.base_dir.join(collection);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let path = self.record_path(collection, id)?;
        read_record(&path).await?.ok_or_else(|| not_found(collection, id))
    }

    async fn create(&self, collection: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        let body = serde_json::to_vec(document)?;

        if self.with_lock(collection, id, write_new(&path, &body)).await? {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists { collection: collection.to_string(), id: id.to_string() })
        }
    }

    async fn update(&self, collection: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        let body = serde_json::to_vec(document)?;

        if self.with_lock(collection, id, replace_existing(&path, &body)).await? {
            Ok(())
        } else {
            Err(not_found(collection, id))
        }
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;

        match self.with_lock(collection, id, merge_fields(&path, fields)).await? {
            Merged::Written => Ok(()),
            Merged::Missing => Err(not_found(collection, id)),
            Merged::NotAnObject => Err(StoreError::NotAnObject {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;

        match self.with_lock(collection, id, fs::remove_file(&path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(collection, id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CHECKS;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_read_update_delete() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.create(CHECKS, "a1", &json!({"state": "down"})).await.unwrap();
        assert_eq!(store.read(CHECKS, "a1").await.unwrap(), json!({"state": "down"}));

        store.update(CHECKS, "a1", &json!({"state": "up"})).await.unwrap();
        assert_eq!(store.read(CHECKS, "a1").await.unwrap(), json!({"state": "up"}));

        store.delete(CHECKS, "a1").await.unwrap();
        assert!(matches!(store.read(CHECKS, "a1").await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_is_exclusive() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.create(CHECKS, "a1", &json!({"n": 1})).await.unwrap();
        let err = store.create(CHECKS, "a1", &json!({"n": 2})).await.unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.read(CHECKS, "a1").await.unwrap(), json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let err = store.update(CHECKS, "ghost", &json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.list(CHECKS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_returns_ids_only() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.list(CHECKS).await.unwrap().is_empty());

        store.create(CHECKS, "b2", &json!({})).await.unwrap();
        store.create(CHECKS, "a1", &json!({})).await.unwrap();
        std::fs::write(dir.path().join(CHECKS).join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list(CHECKS).await.unwrap(), vec!["a1", "b2"]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join(CHECKS)).unwrap();
        std::fs::write(dir.path().join(CHECKS).join("bad.json"), "{not json").unwrap();

        assert!(matches!(store.read(CHECKS, "bad").await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_path_segments_are_checked() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(matches!(store.read(CHECKS, "../etc").await, Err(StoreError::InvalidId(_))));
        assert!(matches!(store.list("..").await, Err(StoreError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_leave_valid_json() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));
        store.create(CHECKS, "a1", &json!({"n": 0})).await.unwrap();

        let writers: Vec<_> = (1..=16)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.update(CHECKS, "a1", &json!({"n": n})).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let n = store.read(CHECKS, "a1").await.unwrap()["n"].as_i64().unwrap();
        assert!((1..=16).contains(&n));
        assert!(store.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_merge_keeps_current_fields() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create(CHECKS, "a1", &json!({"url": "old.test", "state": "down"})).await.unwrap();
        store.update(CHECKS, "a1", &json!({"url": "new.test", "state": "down"})).await.unwrap();

        let mut fields = Map::new();
        fields.insert("state".into(), json!("up"));
        fields.insert("lastChecked".into(), json!(1_700_000_000_000i64));
        store.merge(CHECKS, "a1", &fields).await.unwrap();

        assert_eq!(
            store.read(CHECKS, "a1").await.unwrap(),
            json!({"url": "new.test", "state": "up", "lastChecked": 1_700_000_000_000i64})
        );
    }

    #[tokio::test]
    async fn test_merge_requires_existing_object() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let fields = Map::new();

        let err = store.merge(CHECKS, "ghost", &fields).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.list(CHECKS).await.unwrap().is_empty());

        store.create(CHECKS, "list", &json!([1, 2])).await.unwrap();
        let err = store.merge(CHECKS, "list", &fields).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject { .. }));
    }

    #[tokio::test]
    async fn test_locks_are_released_after_writes() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        for n in 0..10 {
            let id = format!("c{n}");
            store.create(CHECKS, &id, &json!({})).await.unwrap();
            store.merge(CHECKS, &id, &Map::new()).await.unwrap();
            store.delete(CHECKS, &id).await.unwrap();
        }
        assert!(store.create(CHECKS, "c0", &json!({})).await.is_ok());
        assert!(store.create(CHECKS, "c0", &json!({})).await.is_err());

        assert!(store.locks.lock().await.is_empty());
    }
}
