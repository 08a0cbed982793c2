//! WebAssembly bindings for Unwanted
//!
//! Exposes the core to the extension's three JS contexts: the content script
//! (`ContentFilter`), the management page (entry normalization, save, import,
//! export) and the background script (`background_handle_message`).

mod chrome;
mod logger;

use std::rc::Rc;
use std::str::FromStr;

use js_sys::Promise;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use uw_compiler::{ExportDocument, ImportedEntries};
use uw_core::confirm::{await_save_confirmation, SaveConfirmation, SAVE_CONFIRMATION_TIMEOUT};
use uw_core::dispatch::{forward_to_tabs, BackgroundRoute};
use uw_core::message::BlacklistMessage;
use uw_core::{Blacklist, BlacklistStore, Bucket, Controller, Directive, Message, ScrapedItem, Settings, Surface};

pub use chrome::{ChromeStorage, ChromeTabs, RuntimePublisher};

use chrome::{from_js, js_error_message, to_js};

const SITE_URL_PATTERN: &str = "https://www.twitch.tv/*";
const BLACKLIST_PAGE: &str = "/views/blacklist.html";

type TabController = Controller<ChromeStorage, ChromeStorage, RuntimePublisher>;

#[wasm_bindgen]
pub fn init_logging(level: &str) {
    logger::install(logger::parse_level(level));
}

// =============================================================================
// Content script
// =============================================================================

#[wasm_bindgen]
pub struct ContentFilter {
    controller: Rc<TabController>,
}

#[wasm_bindgen]
impl ContentFilter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> ContentFilter {
        let store = BlacklistStore::new(ChromeStorage::sync(), ChromeStorage::local(), RuntimePublisher);
        ContentFilter {
            controller: Rc::new(Controller::new(store)),
        }
    }

    /// Load settings and blacklist. Resolves with the settings.
    pub fn init(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            controller.init().await;
            Ok(settings_to_js(&controller.settings()))
        })
    }

    pub fn settings(&self) -> JsValue {
        settings_to_js(&self.controller.settings())
    }

    pub fn matches(&self, term: &str, bucket: &str) -> Result<bool, JsValue> {
        Ok(self.controller.matches(term, parse_bucket(bucket)?))
    }

    pub fn add_term(&self, bucket: &str, term: &str) -> Result<bool, JsValue> {
        self.controller
            .add_term(parse_bucket(bucket)?, term)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn is_blacklisted_item(&self, item: JsValue) -> Result<bool, JsValue> {
        let item: ScrapedItem = from_js(item)?;
        Ok(self.controller.is_blacklisted_item(&item))
    }

    /// Reason the item is hidden, or `undefined`.
    pub fn match_reason(&self, item: JsValue) -> Result<Option<String>, JsValue> {
        let item: ScrapedItem = from_js(item)?;
        Ok(self.controller.match_item(&item).map(|reason| reason.to_string()))
    }

    /// Indices of the items to hide, or `null` when a pass is already running
    /// on the surface.
    pub fn filter_pass(&self, surface: &str, items: JsValue) -> Result<JsValue, JsValue> {
        let items: Vec<ScrapedItem> = from_js(items)?;
        match self.controller.filter_pass(parse_surface(surface)?, &items) {
            Some(hidden) => to_js(&hidden),
            None => Ok(JsValue::NULL),
        }
    }

    /// Resolves with `{response, directive}`; both may be undefined.
    pub fn handle_message(&self, request: JsValue) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let request: Value = from_js(request)?;
            let outcome = controller.handle_raw_message(&request).await;

            let result = js_sys::Object::new();
            if let Some(response) = outcome.response {
                let _ = js_sys::Reflect::set(&result, &"response".into(), &to_js(&response)?);
            }
            if let Some(directive) = outcome.directive {
                let _ = js_sys::Reflect::set(&result, &"directive".into(), &directive_to_js(directive));
            }
            Ok(result.into())
        })
    }

    pub fn hide_item(&self, item: JsValue) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let item: ScrapedItem = from_js(item)?;
            Ok(JsValue::from(controller.hide_item(&item).await))
        })
    }

    pub fn hide_tag(&self, name: String) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move { Ok(JsValue::from(controller.hide_tag(&name).await)) })
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Management page
// =============================================================================

/// Normalized entry, or `undefined` when nothing is left to add.
#[wasm_bindgen]
pub fn normalize_entry(raw: &str) -> Result<Option<String>, JsValue> {
    uw_compiler::normalize_entry(raw).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Entries of one bucket in listing order.
#[wasm_bindgen]
pub fn sorted_entries(items: JsValue, bucket: &str) -> Result<JsValue, JsValue> {
    let blacklist = blacklist_from_js(items)?;
    to_js(&uw_compiler::sorted_entries(&blacklist, parse_bucket(bucket)?))
}

/// Send the edited blacklist to the content scripts and wait for the writer's
/// confirmation. Resolves with `{success, outcome, switchedToLocal}`.
#[wasm_bindgen]
pub fn save_blacklist(items: JsValue) -> Promise {
    future_to_promise(async move {
        let message = Message::Blacklist(BlacklistMessage::save(blacklist_from_js(items)?));
        let publisher = RuntimePublisher;
        let timeout = gloo_timers::future::TimeoutFuture::new(SAVE_CONFIRMATION_TIMEOUT.as_millis() as u32);

        let confirmation = await_save_confirmation(publisher.request(&message), timeout).await;

        let (outcome, switched_to_local) = match &confirmation {
            SaveConfirmation::Confirmed { switched_to_local } => ("confirmed", *switched_to_local),
            SaveConfirmation::Failed => ("failed", false),
            SaveConfirmation::Unexpected(_) => ("unexpected", false),
            SaveConfirmation::TimedOut => ("timedOut", false),
            SaveConfirmation::SendFailed(_) => ("sendFailed", false),
        };

        let result = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&result, &"success".into(), &JsValue::from(confirmation.is_success()));
        let _ = js_sys::Reflect::set(&result, &"outcome".into(), &JsValue::from_str(outcome));
        let _ = js_sys::Reflect::set(&result, &"switchedToLocal".into(), &JsValue::from(switched_to_local));
        if let SaveConfirmation::SendFailed(error) = &confirmation {
            let _ = js_sys::Reflect::set(&result, &"error".into(), &JsValue::from_str(error));
        }
        Ok(result.into())
    })
}

/// Merge an import file into `items`. Returns the merged blacklist and counts.
#[wasm_bindgen]
pub fn import_blacklist(items: JsValue, text: &str) -> Result<JsValue, JsValue> {
    let mut blacklist = blacklist_from_js(items)?;
    let imported: ImportedEntries =
        uw_compiler::parse_import(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let stats = uw_compiler::merge_import(&mut blacklist, &imported);

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"blacklist".into(), &to_js(&blacklist)?);
    let _ = js_sys::Reflect::set(&result, &"read".into(), &JsValue::from(stats.read as u32));
    let _ = js_sys::Reflect::set(&result, &"added".into(), &JsValue::from(stats.added as u32));
    let _ = js_sys::Reflect::set(&result, &"duplicates".into(), &JsValue::from(stats.duplicates as u32));
    let _ = js_sys::Reflect::set(&result, &"skipped".into(), &JsValue::from(stats.skipped as u32));
    Ok(result.into())
}

/// Build the export file. Returns `{json, fileName}`.
#[wasm_bindgen]
pub fn export_blacklist(items: JsValue) -> Result<JsValue, JsValue> {
    let blacklist = blacklist_from_js(items)?;
    let json = ExportDocument::from_blacklist(&blacklist)
        .to_json()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let now = js_sys::Date::new_0();
    let file_name = uw_compiler::export_file_name(now.get_date(), now.get_month() + 1, now.get_full_year() as i32);

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"json".into(), &JsValue::from_str(&json));
    let _ = js_sys::Reflect::set(&result, &"fileName".into(), &JsValue::from_str(&file_name));
    Ok(result.into())
}

// =============================================================================
// Background
// =============================================================================

/// Handle a runtime message in the background script.
#[wasm_bindgen]
pub fn background_handle_message(request: JsValue) -> Promise {
    future_to_promise(async move {
        let request: Value = from_js(request)?;
        let tabs = ChromeTabs;

        match BackgroundRoute::of(&request) {
            BackgroundRoute::OpenBlacklist => {
                log::info!("Handling action: openBlacklist");
                tabs.open(BLACKLIST_PAGE).await?;
            }
            BackgroundRoute::UnknownAction(action) => {
                log::warn!("Received unknown action: {action}");
            }
            BackgroundRoute::Forward => {
                let targets = tabs.query(SITE_URL_PATTERN).await.map_err(|e| {
                    log::error!("Failed to query tabs: {}", js_error_message(&e));
                    e
                })?;
                let summary = forward_to_tabs(&tabs, &request, &targets).await;
                log::debug!(
                    "Forwarded to {} tabs ({} loading, {} failed)",
                    summary.delivered,
                    summary.skipped,
                    summary.failed
                );
            }
        }
        Ok(JsValue::TRUE)
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_bucket(bucket: &str) -> Result<Bucket, JsValue> {
    Bucket::from_str(bucket).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_surface(surface: &str) -> Result<Surface, JsValue> {
    match surface {
        "directory" => Ok(Surface::Directory),
        "sidebar" => Ok(Surface::Sidebar),
        other => Err(JsValue::from_str(&format!("Unknown surface: {other}"))),
    }
}

fn blacklist_from_js(items: JsValue) -> Result<Blacklist, JsValue> {
    let value: Value = from_js(items)?;
    Ok(Blacklist::from_value(&value))
}

fn settings_to_js(settings: &Settings) -> JsValue {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"enabled".into(), &JsValue::from(settings.enabled));
    let _ = js_sys::Reflect::set(&result, &"renderButtons".into(), &JsValue::from(settings.render_buttons));
    let _ = js_sys::Reflect::set(&result, &"hideFollowing".into(), &JsValue::from(settings.hide_following));
    let _ = js_sys::Reflect::set(&result, &"hideReruns".into(), &JsValue::from(settings.hide_reruns));
    result.into()
}

fn directive_to_js(directive: Directive) -> JsValue {
    let result = js_sys::Object::new();
    let kind = match directive {
        Directive::ToggleButtons(visible) => {
            let _ = js_sys::Reflect::set(&result, &"visible".into(), &JsValue::from(visible));
            "toggleButtons"
        }
        Directive::Reload => "reload",
        Directive::Refilter => "refilter",
    };
    let _ = js_sys::Reflect::set(&result, &"kind".into(), &JsValue::from_str(kind));
    result.into()
}

#[cfg(test)]
mod tests {
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn test_parse_surface() {
        assert_eq!(parse_surface("sidebar").ok(), Some(Surface::Sidebar));
        assert!(parse_surface("feed").is_err());
    }

    #[wasm_bindgen_test]
    fn test_normalize_entry_binding() {
        assert_eq!(normalize_entry("  ~GiveAway ").ok().flatten(), Some("~giveaway".to_string()));
        assert!(normalize_entry("/(/").is_err());
    }

    #[wasm_bindgen_test]
    fn test_blacklist_round_trips_through_js() {
        let mut blacklist = Blacklist::new();
        blacklist.insert(Bucket::Channels, "streamer");
        blacklist.insert(Bucket::Titles, "~rerun");

        let js = to_js(&blacklist).unwrap();
        assert_eq!(blacklist_from_js(js).unwrap(), blacklist);
    }

    #[wasm_bindgen_test]
    fn test_error_message_of_thrown_string() {
        assert_eq!(js_error_message(&JsValue::from_str("MAX_ITEMS quota exceeded")), "MAX_ITEMS quota exceeded");
    }
}
