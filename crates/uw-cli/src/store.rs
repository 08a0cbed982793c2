use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use uw_compiler::{merge_import, parse_import};
use uw_core::storage::MemoryStorage;
use uw_core::{Blacklist, StorageArea, StorageError, StorageQuota};

pub const SYNC_FILE: &str = "sync.json";
pub const LOCAL_FILE: &str = "local.json";

/// A storage area persisted as one JSON object on disk. The sync area
/// enforces its quota the way the browser does.
pub struct FileStorage {
    path: PathBuf,
    inner: MemoryStorage,
}

impl FileStorage {
    pub fn open(path: &Path, quota: Option<StorageQuota>) -> Result<Self, String> {
        let items = if path.exists() {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            match serde_json::from_str::<Value>(&text)
                .map_err(|e| format!("Invalid storage file '{}': {}", path.display(), e))?
            {
                Value::Object(items) => items,
                _ => return Err(format!("Storage file '{}' is not a JSON object", path.display())),
            }
        } else {
            Map::new()
        };

        let inner = match quota {
            Some(quota) => MemoryStorage::with_quota(quota),
            None => MemoryStorage::new(),
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner: inner.with_items(items),
        })
    }

    fn flush(&self) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(&self.inner.snapshot())
            .map_err(|e| StorageError::new(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::new(format!("Failed to create '{}': {}", parent.display(), e)))?;
        }
        fs::write(&self.path, text)
            .map_err(|e| StorageError::new(format!("Failed to write '{}': {}", self.path.display(), e)))
    }
}

impl StorageArea for FileStorage {
    async fn get(&self, keys: Option<&[&str]>) -> Result<Map<String, Value>, StorageError> {
        self.inner.get(keys).await
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        self.inner.set(items).await?;
        self.flush()
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        self.inner.remove(keys).await?;
        self.flush()
    }
}

/// Open the sync and local areas of a store directory.
pub fn open_store(dir: &Path, quota: StorageQuota) -> Result<(FileStorage, FileStorage), String> {
    let sync = FileStorage::open(&dir.join(SYNC_FILE), Some(quota))?;
    let local = FileStorage::open(&dir.join(LOCAL_FILE), None)?;
    Ok((sync, local))
}

/// Read a blacklist file in either storage format (`{"channels": {"x": 1}}`)
/// or export format (`{"channels": ["x"]}`).
pub fn read_blacklist_file(path: &Path) -> Result<Blacklist, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))?;

    let is_export = ["categories", "channels", "tags"]
        .iter()
        .any(|bucket| value.get(bucket).is_some_and(Value::is_array));
    if !is_export {
        return Ok(Blacklist::from_value(&value));
    }

    let imported = parse_import(&text).map_err(|e| format!("Invalid export file '{}': {}", path.display(), e))?;
    let mut blacklist = Blacklist::new();
    merge_import(&mut blacklist, &imported);
    Ok(blacklist)
}

pub fn write_json(path: &Path, value: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize: {}", e))?;
    fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uw_core::message::NullPublisher;
    use uw_core::{BlacklistStore, Bucket};

    use super::*;

    #[tokio::test]
    async fn file_storage_persists_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SYNC_FILE);

        let storage = FileStorage::open(&path, None).unwrap();
        let mut items = Map::new();
        items.insert("enabled".into(), json!(false));
        storage.set(items).await.unwrap();

        let reopened = FileStorage::open(&path, None).unwrap();
        assert_eq!(reopened.get(None).await.unwrap().get("enabled"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn file_storage_enforces_quota() {
        let dir = tempfile::tempdir().unwrap();
        let quota = StorageQuota {
            quota_bytes_per_item: 16,
            max_items: 4,
            quota_bytes: 64,
        };
        let storage = FileStorage::open(&dir.path().join(SYNC_FILE), Some(quota)).unwrap();

        let mut items = Map::new();
        items.insert("blacklistedItems".into(), json!({"channels": {"a": 1}}));
        let error = storage.set(items).await.unwrap_err();
        assert!(error.message.contains("QUOTA_BYTES_PER_ITEM"));
    }

    #[tokio::test]
    async fn oversized_save_lands_in_fragments_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let quota = StorageQuota {
            quota_bytes_per_item: 256,
            max_items: 64,
            quota_bytes: 64 * 256,
        };
        let mut blacklist = Blacklist::new();
        for i in 0..50 {
            blacklist.insert(Bucket::Channels, &format!("streamer_{i}"));
        }

        let (sync, local) = open_store(dir.path(), quota).unwrap();
        let store = BlacklistStore::with_quota(sync, local, NullPublisher, quota);
        store.put(&blacklist).await.unwrap();

        let text = fs::read_to_string(dir.path().join(SYNC_FILE)).unwrap();
        let stored: Value = serde_json::from_str(&text).unwrap();
        assert!(stored.get("blItemsFragment1").is_some());
        assert!(stored.get("blacklistedItems").is_none());

        let (sync, local) = open_store(dir.path(), quota).unwrap();
        let reopened = BlacklistStore::with_quota(sync, local, NullPublisher, quota);
        assert_eq!(reopened.load().await, blacklist);
    }

    #[test]
    fn reads_both_blacklist_formats() {
        let dir = tempfile::tempdir().unwrap();
        let stored = dir.path().join("stored.json");
        let exported = dir.path().join("exported.json");
        write_json(&stored, &json!({"channels": {"streamer": 1}, "titles": ["~rerun"]})).unwrap();
        write_json(&exported, &json!({"channels": ["streamer"], "titles": ["~rerun"]})).unwrap();

        let a = read_blacklist_file(&stored).unwrap();
        let b = read_blacklist_file(&exported).unwrap();
        assert_eq!(a, b);
        assert!(a.contains_key(Bucket::Channels, "streamer"));
    }
}
