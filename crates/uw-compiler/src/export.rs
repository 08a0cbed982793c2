//! Blacklist export
//!
//! The export file holds one array per bucket, each sorted the way the
//! management page lists entries.

use serde::{Deserialize, Serialize};

use uw_core::term::normalize_case;
use uw_core::{Blacklist, Bucket};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub categories: Vec<String>,
    pub channels: Vec<String>,
    pub tags: Vec<String>,
    pub titles: Vec<String>,
}

impl ExportDocument {
    pub fn from_blacklist(blacklist: &Blacklist) -> Self {
        Self {
            categories: sorted_entries(blacklist, Bucket::Categories),
            channels: sorted_entries(blacklist, Bucket::Channels),
            tags: sorted_entries(blacklist, Bucket::Tags),
            titles: sorted_entries(blacklist, Bucket::Titles),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Entries of a bucket sorted case-insensitively. Ties keep stored order.
pub fn sorted_entries(blacklist: &Blacklist, bucket: Bucket) -> Vec<String> {
    let mut entries: Vec<String> = blacklist.entries(bucket).map(str::to_string).collect();
    entries.sort_by_cached_key(|entry| normalize_case(entry));
    entries
}

/// Download name for an export made on the given date.
pub fn export_file_name(day: u32, month: u32, year: i32) -> String {
    format!("UnwantedTwitch_Blacklist_{day}-{month}-{year}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{merge_import, parse_import};

    #[test]
    fn test_sorted_case_insensitively() {
        let mut blacklist = Blacklist::new();
        for title in ["~zebra", "'Apple'", "~banana"] {
            blacklist.insert(Bucket::Titles, title);
        }
        assert_eq!(sorted_entries(&blacklist, Bucket::Titles), ["'Apple'", "~banana", "~zebra"]);
    }

    #[test]
    fn test_export_can_be_imported() {
        let mut original = Blacklist::new();
        original.insert(Bucket::Channels, "streamer");
        original.insert(Bucket::Tags, "/^drops?$/i");
        original.insert(Bucket::Titles, "~giveaway");

        let json = ExportDocument::from_blacklist(&original).to_json().unwrap();
        let mut restored = Blacklist::new();
        merge_import(&mut restored, &parse_import(&json).unwrap());

        assert_eq!(restored, original);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(export_file_name(5, 11, 2024), "UnwantedTwitch_Blacklist_5-11-2024.json");
    }
}
