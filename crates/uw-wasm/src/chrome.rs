//! Extension API bindings
//!
//! Thin wrappers over `chrome.storage`, `chrome.runtime` and `chrome.tabs`
//! that implement the core traits.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use uw_core::dispatch::{TabInfo, TabMessenger};
use uw_core::{Message, PublishError, Publisher, StorageArea, StorageError};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = get)]
    async fn sync_get(keys: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    async fn sync_set(items: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = remove)]
    async fn sync_remove(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    async fn local_get(keys: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    async fn local_set(items: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = remove)]
    async fn local_remove(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    async fn tabs_send_message(tab_id: f64, message: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    async fn tabs_query(query: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = create)]
    async fn tabs_create(properties: JsValue) -> Result<JsValue, JsValue>;
}

// =============================================================================
// Conversions
// =============================================================================

/// Serialize into plain JS objects (maps become objects, not `Map`s).
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Message text of a thrown JS value.
pub(crate) fn js_error_message(error: &JsValue) -> String {
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    error.as_string().unwrap_or_else(|| format!("{error:?}"))
}

fn storage_error(error: JsValue) -> StorageError {
    StorageError::new(js_error_message(&error))
}

fn publish_error(error: JsValue) -> PublishError {
    PublishError::from_message(&js_error_message(&error))
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeArea {
    Sync,
    Local,
}

/// One `chrome.storage` area.
#[derive(Debug, Clone, Copy)]
pub struct ChromeStorage {
    area: ChromeArea,
}

impl ChromeStorage {
    pub fn sync() -> Self {
        Self { area: ChromeArea::Sync }
    }

    pub fn local() -> Self {
        Self { area: ChromeArea::Local }
    }
}

impl StorageArea for ChromeStorage {
    async fn get(&self, keys: Option<&[&str]>) -> Result<Map<String, Value>, StorageError> {
        let keys = match keys {
            Some(keys) => to_js(keys).map_err(storage_error)?,
            None => JsValue::NULL,
        };
        let result = match self.area {
            ChromeArea::Sync => sync_get(keys).await,
            ChromeArea::Local => local_get(keys).await,
        }
        .map_err(storage_error)?;
        from_js(result).map_err(storage_error)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        let items = to_js(&items).map_err(storage_error)?;
        match self.area {
            ChromeArea::Sync => sync_set(items).await,
            ChromeArea::Local => local_set(items).await,
        }
        .map(drop)
        .map_err(storage_error)
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let keys = to_js(keys).map_err(storage_error)?;
        match self.area {
            ChromeArea::Sync => sync_remove(keys).await,
            ChromeArea::Local => local_remove(keys).await,
        }
        .map(drop)
        .map_err(storage_error)
    }
}

// =============================================================================
// Messaging
// =============================================================================

/// `chrome.runtime.sendMessage`, received by the background script.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimePublisher;

impl RuntimePublisher {
    /// Send and wait for the receiver's reply.
    pub async fn request(&self, message: &Message) -> Result<Value, PublishError> {
        let message = to_js(message).map_err(publish_error)?;
        let reply = runtime_send_message(message).await.map_err(publish_error)?;
        if reply.is_undefined() {
            return Ok(Value::Null);
        }
        from_js(reply).map_err(publish_error)
    }
}

impl Publisher for RuntimePublisher {
    async fn publish(&self, message: &Message) -> Result<(), PublishError> {
        self.request(message).await.map(drop)
    }
}

/// `chrome.tabs`, used by the background script.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeTabs;

impl ChromeTabs {
    pub async fn query(&self, url_pattern: &str) -> Result<Vec<TabInfo>, JsValue> {
        let query = to_js(&serde_json::json!({ "url": url_pattern }))?;
        from_js(tabs_query(query).await?)
    }

    pub async fn open(&self, url: &str) -> Result<(), JsValue> {
        let properties = to_js(&serde_json::json!({ "active": true, "url": url }))?;
        tabs_create(properties).await.map(drop)
    }
}

impl TabMessenger for ChromeTabs {
    async fn send_to_tab(&self, tab_id: i64, message: &Value) -> Result<(), PublishError> {
        let message = to_js(message).map_err(publish_error)?;
        tabs_send_message(tab_id as f64, message).await.map(drop).map_err(publish_error)
    }
}
