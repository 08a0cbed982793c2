//! Storage synchronizer
//!
//! Persists the blacklist into the active backend, recovers once from a
//! failed write and tells the other tabs about successful saves.

use std::cell::RefCell;

use serde_json::{Map, Value};

use crate::blacklist::Blacklist;
use crate::message::{publish_best_effort, BlacklistMessage, Message, Publisher};
use crate::settings::{Settings, StorageMode, KEY_USE_LOCAL_STORAGE, STATE_KEYS};
use crate::storage::{
    blacklist_keys, layout_blacklist, read_blacklist, StorageArea, StorageError, StorageFailure, StorageQuota,
    BLACKLIST_KEY,
};

/// A save is tried once, then once more with the backup.
pub const MAX_SAVE_ATTEMPTS: usize = 2;

/// Something the user should be told about a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageAlert {
    /// The sync area is full
    Quota,
    /// Too many writes in a short period
    Throttle,
    /// Any other backend failure
    Issue,
}

impl StorageAlert {
    pub fn from_failure(failure: StorageFailure) -> Self {
        match failure {
            StorageFailure::Quota | StorageFailure::ItemCount => Self::Quota,
            StorageFailure::Throttle => Self::Throttle,
            StorageFailure::Other => Self::Issue,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::Throttle => "throttle",
            Self::Issue => "issue",
        }
    }
}

/// Result of a single write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Saved,
    /// Try again with the backup, after switching to local if asked
    RetryWithFallback { switch_to_local: bool },
    GiveUp,
}

/// What a successful save did.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub mode: StorageMode,
    pub switched_to_local: bool,
    pub alerts: Vec<StorageAlert>,
    /// The blacklist that ended up in storage. Differs from the requested one
    /// when the save only succeeded with the backup.
    pub stored: Blacklist,
}

impl SaveReport {
    pub fn used_backup(&self, requested: &Blacklist) -> bool {
        &self.stored != requested
    }
}

/// Every attempt failed. The caller should restore [`BlacklistStore::backup`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to save blacklist after {attempts} attempts: {last_error}")]
pub struct SaveError {
    pub attempts: usize,
    pub last_error: String,
    pub alerts: Vec<StorageAlert>,
}

/// Owns both backends, the publisher and the last known good blacklist.
pub struct BlacklistStore<S, L, P> {
    sync: S,
    local: L,
    publisher: P,
    quota: StorageQuota,
    backup: RefCell<Blacklist>,
}

impl<S: StorageArea, L: StorageArea, P: Publisher> BlacklistStore<S, L, P> {
    pub fn new(sync: S, local: L, publisher: P) -> Self {
        Self::with_quota(sync, local, publisher, StorageQuota::SYNC)
    }

    pub fn with_quota(sync: S, local: L, publisher: P, quota: StorageQuota) -> Self {
        Self {
            sync,
            local,
            publisher,
            quota,
            backup: RefCell::new(Blacklist::new()),
        }
    }

    pub fn sync_area(&self) -> &S {
        &self.sync
    }

    pub fn local_area(&self) -> &L {
        &self.local
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn quota(&self) -> &StorageQuota {
        &self.quota
    }

    /// Last blacklist known to be in storage.
    pub fn backup(&self) -> Blacklist {
        self.backup.borrow().clone()
    }

    // =========================================================================
    // Mode and settings
    // =========================================================================

    /// Active backend, read from the local area. Read failures mean sync.
    pub async fn storage_mode(&self) -> StorageMode {
        match self.local.get(Some(&[KEY_USE_LOCAL_STORAGE][..])).await {
            Ok(values) => StorageMode::from_use_local(values.get(KEY_USE_LOCAL_STORAGE)),
            Err(e) => {
                log::error!("Failed to read storage mode: {e}");
                StorageMode::Sync
            }
        }
    }

    pub async fn set_storage_mode(&self, mode: StorageMode) -> Result<(), StorageError> {
        let mut values = Map::new();
        values.insert(KEY_USE_LOCAL_STORAGE.into(), Value::Bool(mode == StorageMode::Local));
        self.local.set(values).await?;
        log::info!("Storage mode set to {}", mode.as_str());
        Ok(())
    }

    pub async fn load_settings(&self) -> Settings {
        let mode = self.storage_mode().await;
        match self.area_get(mode, Some(&STATE_KEYS[..])).await {
            Ok(values) => Settings::from_storage(&values),
            Err(e) => {
                log::error!("Failed to read settings from {} storage: {e}", mode.as_str());
                Settings::default()
            }
        }
    }

    /// Write one setting to the active backend.
    pub async fn persist_setting(&self, key: &str, value: bool) -> Result<(), StorageError> {
        let mode = self.storage_mode().await;
        let mut values = Map::new();
        values.insert(key.to_string(), Value::Bool(value));
        self.area_set(mode, values).await
    }

    // =========================================================================
    // Blacklist
    // =========================================================================

    /// Read the blacklist from the active backend. Failures degrade to an
    /// empty blacklist. The result becomes the backup.
    pub async fn load(&self) -> Blacklist {
        let mode = self.storage_mode().await;
        let keys = blacklist_keys(&self.quota);
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let blacklist = match self.area_get(mode, Some(key_refs.as_slice())).await {
            Ok(values) => read_blacklist(&values).unwrap_or_else(|| {
                log::info!("No blacklist in {} storage", mode.as_str());
                Blacklist::new()
            }),
            Err(e) => {
                log::error!("Failed to read blacklist from {} storage: {e}", mode.as_str());
                Blacklist::new()
            }
        };

        log::debug!("Loaded {} blacklist entries", blacklist.total_len());
        *self.backup.borrow_mut() = blacklist.clone();
        blacklist
    }

    /// Persist a blacklist, falling back to the backup (and to local storage
    /// when sync failed) once.
    pub async fn put(&self, blacklist: &Blacklist) -> Result<SaveReport, SaveError> {
        log::trace!("invoking put() with {} entries", blacklist.total_len());

        let mut target = blacklist.clone();
        let mut alerts = Vec::new();
        let mut switched_to_local = false;
        let mut last_error = String::new();

        for attempt in 0..MAX_SAVE_ATTEMPTS {
            let mode = self.storage_mode().await;
            let first = attempt == 0;

            match self.attempt(&target, mode, first, &mut alerts, &mut last_error).await {
                AttemptOutcome::Saved => {
                    log::info!("Blacklist successfully saved to {} storage", mode.as_str());
                    let message = Message::Blacklist(BlacklistMessage::cache_only(target.clone()));
                    publish_best_effort(&self.publisher, &message).await;
                    if first {
                        *self.backup.borrow_mut() = target.clone();
                        log::debug!("Created new backup of blacklist");
                    }
                    return Ok(SaveReport {
                        mode,
                        switched_to_local,
                        alerts,
                        stored: target,
                    });
                }
                AttemptOutcome::RetryWithFallback { switch_to_local } if attempt + 1 < MAX_SAVE_ATTEMPTS => {
                    if switch_to_local {
                        log::warn!("Forcing switch to local storage");
                        if let Err(e) = self.set_storage_mode(StorageMode::Local).await {
                            log::error!("Failed to switch to local storage: {e}");
                            last_error = e.message;
                            break;
                        }
                        switched_to_local = true;
                    }
                    log::warn!("Attempting to restore backup to storage");
                    target = self.backup();
                }
                _ => break,
            }
        }

        log::error!("Recovery failed. Blacklist may not be saved correctly");
        Err(SaveError {
            attempts: MAX_SAVE_ATTEMPTS,
            last_error,
            alerts,
        })
    }

    /// One write of `target` into `mode`'s backend.
    async fn attempt(
        &self,
        target: &Blacklist,
        mode: StorageMode,
        first: bool,
        alerts: &mut Vec<StorageAlert>,
        last_error: &mut String,
    ) -> AttemptOutcome {
        let items = match mode {
            StorageMode::Local => {
                let mut items = Map::new();
                items.insert(BLACKLIST_KEY.into(), target.to_value());
                items
            }
            StorageMode::Sync => match layout_blacklist(target, &self.quota) {
                Ok(items) if items.len() <= self.quota.max_fragments() => items,
                Ok(items) => {
                    log::error!(
                        "Cannot save blacklist: {} fragments exceed the limit of {}",
                        items.len(),
                        self.quota.max_fragments()
                    );
                    *last_error = "too many fragments".into();
                    alerts.push(StorageAlert::Quota);
                    return AttemptOutcome::RetryWithFallback { switch_to_local: true };
                }
                Err(e) => {
                    log::error!("Error during blacklist splitting: {e}");
                    *last_error = e.to_string();
                    alerts.push(StorageAlert::Quota);
                    return AttemptOutcome::RetryWithFallback { switch_to_local: true };
                }
            },
        };

        let result = async {
            self.area_remove(mode, &blacklist_keys(&self.quota)).await?;
            log::debug!("Saving {} keys to {} storage", items.len(), mode.as_str());
            self.area_set(mode, items).await
        }
        .await;

        let Err(error) = result else {
            return AttemptOutcome::Saved;
        };

        log::error!("Error saving blacklist to {} storage: {error}", mode.as_str());
        *last_error = error.message.clone();
        if !first {
            return AttemptOutcome::GiveUp;
        }
        alerts.push(StorageAlert::from_failure(error.failure()));
        match mode {
            StorageMode::Sync => AttemptOutcome::RetryWithFallback { switch_to_local: true },
            StorageMode::Local => {
                log::error!("Local storage save also failed. Cannot recover");
                AttemptOutcome::GiveUp
            }
        }
    }

    async fn area_get(&self, mode: StorageMode, keys: Option<&[&str]>) -> Result<Map<String, Value>, StorageError> {
        match mode {
            StorageMode::Sync => self.sync.get(keys).await,
            StorageMode::Local => self.local.get(keys).await,
        }
    }

    async fn area_set(&self, mode: StorageMode, items: Map<String, Value>) -> Result<(), StorageError> {
        match mode {
            StorageMode::Sync => self.sync.set(items).await,
            StorageMode::Local => self.local.set(items).await,
        }
    }

    async fn area_remove(&self, mode: StorageMode, keys: &[String]) -> Result<(), StorageError> {
        match mode {
            StorageMode::Sync => self.sync.remove(keys).await,
            StorageMode::Local => self.local.remove(keys).await,
        }
    }
}
