//! Persisted preferences
//!
//! Every flag is defaulted on its own when the stored value is missing or not
//! a boolean.

use serde_json::{Map, Value};

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_RENDER_BUTTONS: &str = "renderButtons";
pub const KEY_HIDE_FOLLOWING: &str = "hideFollowing";
pub const KEY_HIDE_RERUNS: &str = "hideReruns";
/// Always kept in the local backend, since it selects the backend.
pub const KEY_USE_LOCAL_STORAGE: &str = "useLocalStorage";

/// Keys read from the active backend on startup.
pub const STATE_KEYS: [&str; 4] = [KEY_ENABLED, KEY_RENDER_BUTTONS, KEY_HIDE_FOLLOWING, KEY_HIDE_RERUNS];

/// Which backend holds the blacklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageMode {
    /// Size-limited, synchronized across the user's browsers
    #[default]
    Sync,
    Local,
}

impl StorageMode {
    pub fn from_use_local(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_bool) {
            Some(true) => Self::Local,
            _ => Self::Sync,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Filtering is active at all
    pub enabled: bool,
    /// Hide buttons are attached to cards
    pub render_buttons: bool,
    /// Followed channels/categories are filtered too
    pub hide_following: bool,
    pub hide_reruns: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            render_buttons: true,
            hide_following: true,
            hide_reruns: false,
        }
    }
}

impl Settings {
    /// Read settings from a storage result, defaulting each flag separately.
    pub fn from_storage(values: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| values.get(key).and_then(Value::as_bool).unwrap_or(default);

        Self {
            enabled: flag(KEY_ENABLED, defaults.enabled),
            render_buttons: flag(KEY_RENDER_BUTTONS, defaults.render_buttons),
            hide_following: flag(KEY_HIDE_FOLLOWING, defaults.hide_following),
            hide_reruns: flag(KEY_HIDE_RERUNS, defaults.hide_reruns),
        }
    }

    pub fn to_storage(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(KEY_ENABLED.into(), Value::Bool(self.enabled));
        values.insert(KEY_RENDER_BUTTONS.into(), Value::Bool(self.render_buttons));
        values.insert(KEY_HIDE_FOLLOWING.into(), Value::Bool(self.hide_following));
        values.insert(KEY_HIDE_RERUNS.into(), Value::Bool(self.hide_reruns));
        values
    }
}
