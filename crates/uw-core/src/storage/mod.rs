//! Key-value storage backends
//!
//! The extension persists into one of two areas: a size-limited `sync` area
//! and a larger `local` area. Both are modeled by [`StorageArea`]. Errors carry
//! the backend's message text, which is all the browser gives us to tell a
//! quota failure from a throttled write.

mod fragment;
mod memory;

pub use fragment::*;
pub use memory::*;

use serde_json::{Map, Value};

/// Key of the blacklist when it fits in a single item.
pub const BLACKLIST_KEY: &str = "blacklistedItems";
/// Prefix of numbered fragment keys (`blItemsFragment0`, `blItemsFragment1`, ...).
pub const FRAGMENT_KEY_PREFIX: &str = "blItemsFragment";

/// Setting keys that share the sync area with the fragments.
pub const RESERVED_KEY_COUNT: usize = 5;

/// Error reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StorageError {
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn failure(&self) -> StorageFailure {
        StorageFailure::classify(&self.message)
    }
}

/// Kind of a storage write failure, inferred from the error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFailure {
    /// Total or per-item byte quota exceeded
    Quota,
    /// Too many stored items
    ItemCount,
    /// Too many writes in a short period
    Throttle,
    Other,
}

impl StorageFailure {
    pub fn classify(message: &str) -> Self {
        if message.contains("QUOTA_BYTES") {
            Self::Quota
        } else if message.contains("MAX_ITEMS") {
            Self::ItemCount
        } else if message.contains("MAX_WRITE_OPERATIONS_PER") {
            Self::Throttle
        } else {
            Self::Other
        }
    }
}

/// Limits of a storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    /// Bytes per item: key length plus serialized value length
    pub quota_bytes_per_item: usize,
    pub max_items: usize,
    /// Bytes for the whole area
    pub quota_bytes: usize,
}

impl StorageQuota {
    /// Limits of the browser's sync area.
    pub const SYNC: StorageQuota = StorageQuota {
        quota_bytes_per_item: 8_192,
        max_items: 512,
        quota_bytes: 102_400,
    };

    /// Number of fragment keys the blacklist may occupy.
    pub fn max_fragments(&self) -> usize {
        self.max_items.saturating_sub(RESERVED_KEY_COUNT)
    }
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self::SYNC
    }
}

/// One storage area. All calls are suspension points; callers await them.
#[allow(async_fn_in_trait)]
pub trait StorageArea {
    /// Read the given keys, or everything when `keys` is `None`. Missing keys
    /// are absent from the result.
    async fn get(&self, keys: Option<&[&str]>) -> Result<Map<String, Value>, StorageError>;

    /// Write all items in one operation.
    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError>;

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;
}

pub fn fragment_key(index: usize) -> String {
    format!("{FRAGMENT_KEY_PREFIX}{index}")
}

/// Every key a stored blacklist may occupy, for cleanup before a write.
pub fn blacklist_keys(quota: &StorageQuota) -> Vec<String> {
    let mut keys = Vec::with_capacity(quota.max_fragments() + 1);
    keys.push(BLACKLIST_KEY.to_string());
    keys.extend((0..quota.max_fragments()).map(fragment_key));
    keys
}

/// Bytes an item occupies the way the browser counts them.
pub fn measure_stored_size(key: &str, value: &Value) -> usize {
    key.len() + serde_json::to_string(value).map_or(0, |s| s.len())
}
