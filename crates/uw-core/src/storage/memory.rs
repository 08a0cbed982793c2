//! In-memory storage area with optional quota enforcement.
//!
//! Error messages follow the wording the browser uses so that failure
//! classification behaves the same as against the real backend.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use serde_json::{Map, Value};

use super::{measure_stored_size, StorageArea, StorageError, StorageQuota};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<Map<String, Value>>,
    quota: Option<StorageQuota>,
    /// Errors returned by the next `set` calls, in order
    injected: RefCell<VecDeque<StorageError>>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    /// Unlimited area, like the local backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Area enforcing the given limits, like the sync backend.
    pub fn with_quota(quota: StorageQuota) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    pub fn from_items(items: Map<String, Value>) -> Self {
        Self::new().with_items(items)
    }

    /// Replace the stored items, keeping the quota.
    pub fn with_items(self, items: Map<String, Value>) -> Self {
        self.items.replace(items);
        self
    }

    /// Make the next `set` fail with the given message.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.injected.borrow_mut().push_back(StorageError::new(message));
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.items.borrow().clone()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.borrow().contains_key(key)
    }

    fn check_quota(&self, pending: &Map<String, Value>) -> Result<(), StorageError> {
        let Some(quota) = self.quota else {
            return Ok(());
        };

        for (key, value) in pending {
            if measure_stored_size(key, value) > quota.quota_bytes_per_item {
                return Err(StorageError::new("QUOTA_BYTES_PER_ITEM quota exceeded"));
            }
        }

        let items = self.items.borrow();
        let mut merged: Map<String, Value> = items.clone();
        merged.extend(pending.clone());

        if merged.len() > quota.max_items {
            return Err(StorageError::new("MAX_ITEMS quota exceeded"));
        }
        let total: usize = merged.iter().map(|(k, v)| measure_stored_size(k, v)).sum();
        if total > quota.quota_bytes {
            return Err(StorageError::new("QUOTA_BYTES quota exceeded"));
        }
        Ok(())
    }
}

impl StorageArea for MemoryStorage {
    async fn get(&self, keys: Option<&[&str]>) -> Result<Map<String, Value>, StorageError> {
        let items = self.items.borrow();
        Ok(match keys {
            None => items.clone(),
            Some(keys) => keys
                .iter()
                .filter_map(|key| items.get(*key).map(|v| (key.to_string(), v.clone())))
                .collect(),
        })
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        if let Some(error) = self.injected.borrow_mut().pop_front() {
            return Err(error);
        }
        self.check_quota(&items)?;
        self.items.borrow_mut().extend(items);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.borrow_mut();
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn items(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn get_returns_requested_keys_only() {
        let storage = MemoryStorage::from_items(items(json!({"a": 1, "b": 2})));
        let result = storage.get(Some(&["a", "missing"][..])).await.unwrap();
        assert_eq!(result, items(json!({"a": 1})));
        assert_eq!(storage.get(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn enforces_per_item_quota() {
        let storage = MemoryStorage::with_quota(StorageQuota {
            quota_bytes_per_item: 10,
            max_items: 10,
            quota_bytes: 100,
        });
        let error = storage.set(items(json!({"key": "a long value"}))).await.unwrap_err();
        assert!(error.message.contains("QUOTA_BYTES_PER_ITEM"));
        assert!(!storage.contains_key("key"));
    }

    #[tokio::test]
    async fn enforces_item_count() {
        let storage = MemoryStorage::with_quota(StorageQuota {
            quota_bytes_per_item: 100,
            max_items: 1,
            quota_bytes: 1000,
        });
        storage.set(items(json!({"a": 1}))).await.unwrap();
        let error = storage.set(items(json!({"b": 1}))).await.unwrap_err();
        assert!(error.message.contains("MAX_ITEMS"));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let storage = MemoryStorage::new();
        storage.fail_next_write("MAX_WRITE_OPERATIONS_PER_MINUTE quota exceeded");
        assert!(storage.set(items(json!({"a": 1}))).await.is_err());
        storage.set(items(json!({"a": 1}))).await.unwrap();
        assert_eq!(storage.write_count(), 1);
    }
}
