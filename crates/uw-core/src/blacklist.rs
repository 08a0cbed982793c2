//! Blacklist store
//!
//! Map-typed buckets are stored as sets and serialized as `{"term": 1}` so the
//! persisted shape stays compatible with what the extension has always
//! written. Loading is tolerant: whatever JSON comes back from storage is
//! normalized so that all four buckets are present and correctly typed.

use std::collections::BTreeSet;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Bucket;

/// Value stored for every key of a map-typed bucket.
pub const SET_SENTINEL: u8 = 1;

/// The user's blacklist: three key sets and an ordered title list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Blacklist {
    #[serde(serialize_with = "serialize_set")]
    pub categories: BTreeSet<String>,
    #[serde(serialize_with = "serialize_set")]
    pub channels: BTreeSet<String>,
    #[serde(serialize_with = "serialize_set")]
    pub tags: BTreeSet<String>,
    pub titles: Vec<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a normalized blacklist from untyped storage data.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            if !value.is_null() {
                log::warn!("Discarding non-object blacklist data: {value}");
            }
            return Self::default();
        };

        let mut result = Self::default();
        for bucket in Bucket::ALL {
            let Some(raw) = object.get(bucket.as_str()) else {
                continue;
            };
            match (bucket, raw) {
                (Bucket::Titles, Value::Array(entries)) => {
                    for entry in entries {
                        match entry.as_str() {
                            Some(title) => {
                                result.titles.push(title.to_string());
                            }
                            None => log::warn!("Skipping non-string title entry: {entry}"),
                        }
                    }
                }
                (Bucket::Titles, _) => {
                    log::warn!("Correcting non-array titles blacklist to array.");
                }
                (_, Value::Object(keys)) => {
                    if let Some(set) = result.set_mut(bucket) {
                        set.extend(keys.keys().cloned());
                    }
                }
                (_, _) => {
                    log::warn!("Correcting non-object {bucket} blacklist to object.");
                }
            }
        }
        result
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Add a term. Returns `false` when the term was already present.
    pub fn insert(&mut self, bucket: Bucket, term: &str) -> bool {
        match self.set_mut(bucket) {
            Some(set) => set.insert(term.to_string()),
            None => {
                if self.titles.iter().any(|t| t == term) {
                    return false;
                }
                self.titles.push(term.to_string());
                true
            }
        }
    }

    pub fn remove(&mut self, bucket: Bucket, term: &str) -> bool {
        match self.set_mut(bucket) {
            Some(set) => set.remove(term),
            None => {
                let before = self.titles.len();
                self.titles.retain(|t| t != term);
                before != self.titles.len()
            }
        }
    }

    /// Direct key lookup. Always false for titles, which have no keys.
    #[inline]
    pub fn contains_key(&self, bucket: Bucket, key: &str) -> bool {
        self.set(bucket).is_some_and(|set| set.contains(key))
    }

    /// Iterate the raw entries of one bucket in storage order.
    pub fn entries(&self, bucket: Bucket) -> Box<dyn Iterator<Item = &str> + '_> {
        match self.set(bucket) {
            Some(set) => Box::new(set.iter().map(String::as_str)),
            None => Box::new(self.titles.iter().map(String::as_str)),
        }
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        match self.set(bucket) {
            Some(set) => set.len(),
            None => self.titles.len(),
        }
    }

    pub fn total_len(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.len(*b)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn clear(&mut self, bucket: Bucket) {
        match self.set_mut(bucket) {
            Some(set) => set.clear(),
            None => self.titles.clear(),
        }
    }

    /// Union another blacklist into this one, keeping title order.
    /// Returns the number of entries that were new.
    pub fn merge(&mut self, other: &Blacklist) -> usize {
        let mut added = 0;
        for bucket in Bucket::ALL {
            for entry in other.entries(bucket) {
                if self.insert(bucket, entry) {
                    added += 1;
                }
            }
        }
        added
    }

    fn set(&self, bucket: Bucket) -> Option<&BTreeSet<String>> {
        match bucket {
            Bucket::Categories => Some(&self.categories),
            Bucket::Channels => Some(&self.channels),
            Bucket::Tags => Some(&self.tags),
            Bucket::Titles => None,
        }
    }

    fn set_mut(&mut self, bucket: Bucket) -> Option<&mut BTreeSet<String>> {
        match bucket {
            Bucket::Categories => Some(&mut self.categories),
            Bucket::Channels => Some(&mut self.channels),
            Bucket::Tags => Some(&mut self.tags),
            Bucket::Titles => None,
        }
    }
}

impl From<Value> for Blacklist {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

fn serialize_set<S: Serializer>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(set.len()))?;
    for key in set {
        map.serialize_entry(key, &SET_SENTINEL)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_sets_as_sentinel_maps() {
        let mut blacklist = Blacklist::new();
        blacklist.insert(Bucket::Categories, "Just Chatting");
        blacklist.insert(Bucket::Titles, "~giveaway");

        let json = serde_json::to_string(&blacklist).unwrap();
        assert_eq!(
            json,
            r#"{"categories":{"Just Chatting":1},"channels":{},"tags":{},"titles":["~giveaway"]}"#
        );
    }

    #[test]
    fn normalizes_missing_and_mistyped_buckets() {
        let blacklist = Blacklist::from_value(&json!({
            "channels": ["not", "a", "map"],
            "tags": {"english": 1},
            "titles": {"oops": 1}
        }));
        assert!(blacklist.categories.is_empty());
        assert!(blacklist.channels.is_empty());
        assert!(blacklist.contains_key(Bucket::Tags, "english"));
        assert!(blacklist.titles.is_empty());

        assert_eq!(Blacklist::from_value(&json!("garbage")), Blacklist::new());
        assert_eq!(Blacklist::from_value(&Value::Null), Blacklist::new());
    }

    #[test]
    fn skips_non_string_titles() {
        let blacklist = Blacklist::from_value(&json!({"titles": ["a", 5, null, "b"]}));
        assert_eq!(blacklist.titles, vec!["a", "b"]);
    }

    #[test]
    fn deserialize_is_tolerant() {
        let blacklist: Blacklist = serde_json::from_str(r#"{"categories":{"chess":1},"titles":7}"#).unwrap();
        assert!(blacklist.contains_key(Bucket::Categories, "chess"));
        assert!(blacklist.titles.is_empty());
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut blacklist = Blacklist::new();
        assert!(blacklist.insert(Bucket::Titles, "a"));
        assert!(!blacklist.insert(Bucket::Titles, "a"));
        assert!(blacklist.insert(Bucket::Channels, "a"));
        assert!(!blacklist.insert(Bucket::Channels, "a"));
        assert_eq!(blacklist.total_len(), 2);
        assert!(!blacklist.contains_key(Bucket::Titles, "a"));
    }

    #[test]
    fn merge_keeps_title_order() {
        let mut left = Blacklist::new();
        left.insert(Bucket::Titles, "b");
        let mut right = Blacklist::new();
        right.insert(Bucket::Titles, "a");
        right.insert(Bucket::Titles, "b");
        right.insert(Bucket::Tags, "x");

        assert_eq!(left.merge(&right), 2);
        assert_eq!(left.titles, vec!["b", "a"]);
    }
}
