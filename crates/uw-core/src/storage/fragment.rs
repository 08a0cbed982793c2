//! Blacklist fragments
//!
//! A blacklist too large for one sync item is split into partial blacklists,
//! each small enough for its own key. Fragments are filled greedily in bucket
//! order, so reading them back in index order restores title order.

use serde_json::{Map, Value};

use super::{fragment_key, measure_stored_size, StorageQuota, BLACKLIST_KEY};
use crate::blacklist::Blacklist;
use crate::types::Bucket;

/// Serialized length of a fragment with no entries.
const EMPTY_FRAGMENT_LEN: usize = r#"{"categories":{},"channels":{},"tags":{},"titles":[]}"#.len();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FragmentError {
    #[error("Entry in {bucket} needs {required} bytes, but a fragment holds at most {available}")]
    EntryTooLarge {
        bucket: Bucket,
        required: usize,
        available: usize,
    },
}

/// Split a blacklist into fragments that each fit the per-item quota.
pub fn split_blacklist(blacklist: &Blacklist, quota: &StorageQuota) -> Result<Vec<Blacklist>, FragmentError> {
    let mut fragments = Vec::new();
    let mut current = Blacklist::new();
    let mut size = EMPTY_FRAGMENT_LEN;

    for bucket in Bucket::ALL {
        for entry in blacklist.entries(bucket) {
            let separator = usize::from(current.len(bucket) > 0);
            let cost = entry_cost(bucket, entry);

            if size + separator + cost > fragment_budget(quota, fragments.len()) {
                if !current.is_empty() {
                    fragments.push(std::mem::take(&mut current));
                    size = EMPTY_FRAGMENT_LEN;
                }
                let available = fragment_budget(quota, fragments.len()).saturating_sub(EMPTY_FRAGMENT_LEN);
                if cost > available {
                    return Err(FragmentError::EntryTooLarge {
                        bucket,
                        required: cost,
                        available,
                    });
                }
                size += cost;
            } else {
                size += separator + cost;
            }
            push_entry(&mut current, bucket, entry);
        }
    }

    if !current.is_empty() || fragments.is_empty() {
        fragments.push(current);
    }

    log::debug!("Split blacklist into {} fragments", fragments.len());
    Ok(fragments)
}

/// Reassemble fragments `0..N` from a storage result. Stops at the first
/// missing index.
pub fn merge_fragments(values: &Map<String, Value>) -> Blacklist {
    let mut result = Blacklist::new();
    let mut index = 0;

    while let Some(value) = values.get(&fragment_key(index)) {
        let fragment = Blacklist::from_value(value);
        result.categories.extend(fragment.categories);
        result.channels.extend(fragment.channels);
        result.tags.extend(fragment.tags);
        result.titles.extend(fragment.titles);
        index += 1;
    }

    log::debug!("Merged {index} fragments");
    result
}

/// Read a blacklist from a storage result, whichever layout it was saved in.
pub fn read_blacklist(values: &Map<String, Value>) -> Option<Blacklist> {
    if let Some(value) = values.get(BLACKLIST_KEY).filter(|v| v.is_object()) {
        return Some(Blacklist::from_value(value));
    }
    if values.get(&fragment_key(0)).is_some_and(Value::is_object) {
        return Some(merge_fragments(values));
    }
    None
}

/// Lay a blacklist out as storage items: one key when it fits, fragments
/// otherwise.
pub fn layout_blacklist(
    blacklist: &Blacklist,
    quota: &StorageQuota,
) -> Result<Map<String, Value>, FragmentError> {
    let value = blacklist.to_value();
    let required = measure_stored_size(BLACKLIST_KEY, &value);

    let mut items = Map::new();
    if required <= quota.quota_bytes_per_item {
        items.insert(BLACKLIST_KEY.to_string(), value);
        return Ok(items);
    }

    log::warn!(
        "Blacklist ({required} bytes) exceeds sync limit per item ({}). Splitting...",
        quota.quota_bytes_per_item
    );
    for (index, fragment) in split_blacklist(blacklist, quota)?.iter().enumerate() {
        items.insert(fragment_key(index), fragment.to_value());
    }
    Ok(items)
}

/// Bytes left for the value of fragment `index` after its key.
fn fragment_budget(quota: &StorageQuota, index: usize) -> usize {
    quota.quota_bytes_per_item.saturating_sub(fragment_key(index).len())
}

/// Serialized bytes one entry adds to a fragment, separator excluded.
fn entry_cost(bucket: Bucket, entry: &str) -> usize {
    let quoted = serde_json::to_string(entry).map_or(entry.len() + 2, |s| s.len());
    if bucket.is_map() {
        // "key":1
        quoted + 2
    } else {
        quoted
    }
}

fn push_entry(fragment: &mut Blacklist, bucket: Bucket, entry: &str) {
    match bucket {
        // Titles are copied verbatim so duplicates survive the round trip
        Bucket::Titles => fragment.titles.push(entry.to_string()),
        _ => {
            fragment.insert(bucket, entry);
        }
    }
}
