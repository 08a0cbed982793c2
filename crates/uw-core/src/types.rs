//! Core type definitions for Unwanted
//!
//! Buckets name the four blacklist categories; scraped items are what the
//! page glue reads out of one directory card or sidebar entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Buckets
// =============================================================================

/// One of the four blacklist categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Categories,
    Channels,
    Tags,
    /// The only list-typed bucket; order is preserved.
    Titles,
}

impl Bucket {
    /// All buckets in storage order.
    pub const ALL: [Bucket; 4] = [
        Bucket::Categories,
        Bucket::Channels,
        Bucket::Tags,
        Bucket::Titles,
    ];

    /// Name used as the JSON key in storage and messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Channels => "channels",
            Self::Tags => "tags",
            Self::Titles => "titles",
        }
    }

    /// Map-typed buckets are looked up by key before the caches are scanned.
    #[inline]
    pub const fn is_map(self) -> bool {
        !matches!(self, Self::Titles)
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categories" => Ok(Self::Categories),
            "channels" => Ok(Self::Channels),
            "tags" => Ok(Self::Tags),
            "titles" => Ok(Self::Titles),
            other => Err(UnknownBucket(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown bucket: {0}")]
pub struct UnknownBucket(pub String);

// =============================================================================
// Scraped Items
// =============================================================================

/// A page item read by the content script for a single filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedItem {
    /// Bucket the item itself belongs to (a channel card or a category card).
    #[serde(rename = "type")]
    pub item_type: Option<Bucket>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<ItemTag>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rerun: bool,
}

/// Tag attached to a scraped item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    pub name: String,
}

impl ItemTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ScrapedItem {
    /// Value matched against the item's own bucket.
    pub fn own_name(&self) -> &str {
        match self.item_type {
            Some(Bucket::Categories) => &self.category,
            _ => &self.name,
        }
    }

    /// Human-readable identifier for log lines.
    pub fn identifier(&self) -> &str {
        [&self.name, &self.category, &self.title]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("Unknown Item")
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// Why an item was classified as blacklisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// Reruns are hidden and the item is a rerun
    Rerun,
    /// The item's own name matched its bucket
    Name(Bucket),
    /// A channel's category matched the categories bucket
    Category,
    /// One of the item's tags matched
    Tag(String),
    /// The title matched
    Title,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rerun => f.write_str("rerun"),
            Self::Name(bucket) => write!(f, "name match ({bucket})"),
            Self::Category => f.write_str("category match"),
            Self::Tag(tag) => write!(f, "tag match '{tag}'"),
            Self::Title => f.write_str("title match"),
        }
    }
}

/// Page surface a filter pass runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Directory,
    Sidebar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_round_trips_through_name() {
        for bucket in Bucket::ALL {
            assert_eq!(bucket.as_str().parse::<Bucket>(), Ok(bucket));
        }
        assert!("streams".parse::<Bucket>().is_err());
    }

    #[test]
    fn only_titles_is_list_typed() {
        assert!(Bucket::Categories.is_map());
        assert!(Bucket::Channels.is_map());
        assert!(Bucket::Tags.is_map());
        assert!(!Bucket::Titles.is_map());
    }

    #[test]
    fn category_items_use_category_as_name() {
        let item = ScrapedItem {
            item_type: Some(Bucket::Categories),
            name: String::new(),
            category: "Just Chatting".into(),
            ..Default::default()
        };
        assert_eq!(item.own_name(), "Just Chatting");
        assert_eq!(item.identifier(), "Just Chatting");
    }

    #[test]
    fn scraped_item_deserializes_from_glue_shape() {
        let item: ScrapedItem = serde_json::from_str(
            r#"{"type":"channels","name":"streamer","category":"Chess","tags":[{"name":"English"}],"title":"hi","rerun":true}"#,
        )
        .unwrap();
        assert_eq!(item.item_type, Some(Bucket::Channels));
        assert_eq!(item.tags, vec![ItemTag::new("English")]);
        assert!(item.rerun);
    }
}
