//! Cross-tab messages
//!
//! Shapes exchanged over the extension's runtime channel between the
//! management page, the background script and the content scripts.

use std::cell::RefCell;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blacklist::Blacklist;

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Show or hide the injected hide buttons
    RenderButtons {
        #[serde(rename = "renderButtons")]
        render_buttons: bool,
    },
    /// Turn filtering on or off
    Extension { extension: ExtensionCommand },
    /// New blacklist to save or to adopt
    Blacklist(BlacklistMessage),
    /// Request handled by the background script
    Action { action: Action },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionCommand {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    OpenBlacklist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistMessage {
    #[serde(deserialize_with = "blacklist_object")]
    pub blacklisted_items: Blacklist,
    /// `Some(false)` marks a cache-only update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<bool>,
    /// Set by the background for every tab it forwards to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatcher_index: Option<i64>,
}

impl BlacklistMessage {
    /// Save request sent by the management page.
    pub fn save(items: Blacklist) -> Self {
        Self {
            blacklisted_items: items,
            storage: None,
            dispatcher_index: None,
        }
    }

    /// Broadcast after a successful write; receivers only refresh their cache.
    pub fn cache_only(items: Blacklist) -> Self {
        Self {
            blacklisted_items: items,
            storage: Some(false),
            dispatcher_index: None,
        }
    }

    pub fn is_cache_only(&self) -> bool {
        self.storage == Some(false)
    }

    /// Only the first tab a save is forwarded to writes storage.
    pub fn is_elected_writer(&self) -> bool {
        self.dispatcher_index.map_or(true, |index| index <= 0)
    }
}

/// Anything but an object is not a blacklist, so the message is not one either.
fn blacklist_object<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Blacklist, D::Error> {
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(Blacklist::from_value(&value)),
        other => Err(de::Error::custom(format!("blacklistedItems must be an object, got {other}"))),
    }
}

/// Reply to a blacklist message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    /// This tab performed the write
    #[serde(default)]
    pub processed_save: bool,
    /// The write ended up in local storage after sync failed
    #[serde(default)]
    pub switched_to_local: bool,
}

// =============================================================================
// Publishing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Nobody is listening; a normal outcome when no other tab is open
    #[error("No receiver for message")]
    NoReceiver,
    #[error("Failed to publish message: {0}")]
    Failed(String),
}

impl PublishError {
    /// Classify a runtime messaging error by its text.
    pub fn from_message(message: &str) -> Self {
        if message.contains("Could not establish connection") || message.contains("Receiving end does not exist") {
            Self::NoReceiver
        } else {
            Self::Failed(message.to_string())
        }
    }
}

/// Fire-and-forget channel to the other tabs.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    async fn publish(&self, message: &Message) -> Result<(), PublishError>;
}

/// Publish and log the outcome. Absence of receivers is not an error.
pub async fn publish_best_effort<P: Publisher>(publisher: &P, message: &Message) {
    match publisher.publish(message).await {
        Ok(()) => log::debug!("Broadcast delivered"),
        Err(PublishError::NoReceiver) => log::debug!("No other active tabs to sync with"),
        Err(e) => log::error!("Error broadcasting message: {e}"),
    }
}

/// Publisher with no receivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    async fn publish(&self, _message: &Message) -> Result<(), PublishError> {
        Err(PublishError::NoReceiver)
    }
}

/// Publisher that keeps every message, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    sent: RefCell<Vec<Message>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.borrow().clone()
    }
}

impl Publisher for RecordingPublisher {
    async fn publish(&self, message: &Message) -> Result<(), PublishError> {
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}
