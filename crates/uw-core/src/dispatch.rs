//! Background forwarding
//!
//! The background script relays every non-action message to the site's tabs,
//! numbering the deliveries so that exactly one tab acts as the writer.

use serde::Deserialize;
use serde_json::Value;

use crate::message::PublishError;

/// What the background does with an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundRoute {
    OpenBlacklist,
    UnknownAction(String),
    /// Relay to the content scripts
    Forward,
}

impl BackgroundRoute {
    pub fn of(request: &Value) -> Self {
        match request.get("action") {
            Some(Value::String(action)) if action == "openBlacklist" => Self::OpenBlacklist,
            Some(Value::Null | Value::Bool(false)) | None => Self::Forward,
            Some(other) => Self::UnknownAction(other.as_str().map_or_else(|| other.to_string(), str::to_string)),
        }
    }
}

/// The part of a browser tab the dispatcher looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TabInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TabInfo {
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }
}

/// Delivers a message to one tab.
#[allow(async_fn_in_trait)]
pub trait TabMessenger {
    async fn send_to_tab(&self, tab_id: i64, message: &Value) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    /// Tabs still loading
    pub skipped: usize,
    pub failed: usize,
}

/// Send `request` to every tab with a URL. `dispatcherIndex` starts at 0 and
/// only advances after a successful delivery to a loaded tab.
pub async fn forward_to_tabs<M: TabMessenger>(messenger: &M, request: &Value, tabs: &[TabInfo]) -> DispatchSummary {
    let relevant: Vec<&TabInfo> = tabs.iter().filter(|tab| tab.url.is_some()).collect();
    log::debug!("Forwarding message to {} relevant tabs", relevant.len());

    let mut summary = DispatchSummary::default();
    let mut request = request.clone();
    let mut dispatcher_index: i64 = 0;

    for tab in relevant {
        if let Value::Object(fields) = &mut request {
            fields.insert("dispatcherIndex".into(), Value::from(dispatcher_index));
        }

        let Some(tab_id) = tab.id.filter(|_| tab.is_complete()) else {
            log::debug!(
                "Skipping message send to tab {:?}, status is {:?}",
                tab.id,
                tab.status.as_deref().unwrap_or("unknown")
            );
            summary.skipped += 1;
            continue;
        };

        match messenger.send_to_tab(tab_id, &request).await {
            Ok(()) => {
                dispatcher_index += 1;
                summary.delivered += 1;
                log::debug!("Message sent successfully to tab {tab_id}");
            }
            Err(PublishError::NoReceiver) => {
                summary.failed += 1;
                log::debug!("Could not send message to tab {tab_id} (likely not ready)");
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("Error sending message to tab {tab_id}: {e}");
            }
        }
    }

    summary
}
