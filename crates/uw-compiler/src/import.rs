//! Blacklist import
//!
//! Accepts the export format: a JSON object with an array of strings per
//! bucket. Missing buckets and non-string entries are skipped.

use serde_json::Value;

use uw_core::{Blacklist, Bucket};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Entries read from an import file, per bucket, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedEntries {
    buckets: [Vec<String>; 4],
    /// Entries that were not non-empty strings
    pub skipped: usize,
}

impl ImportedEntries {
    pub fn entries(&self, bucket: Bucket) -> &[String] {
        &self.buckets[bucket_slot(bucket)]
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ImportStats {
    pub read: usize,
    pub added: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

pub fn parse_import(text: &str) -> Result<ImportedEntries, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(ImportError::NotAnObject(json_type(&value)))?;

    let mut imported = ImportedEntries::default();
    for bucket in Bucket::ALL {
        match object.get(bucket.as_str()) {
            Some(Value::Array(values)) => {
                for value in values {
                    match value.as_str() {
                        Some(entry) if !entry.is_empty() => {
                            imported.buckets[bucket_slot(bucket)].push(entry.to_string())
                        }
                        _ => imported.skipped += 1,
                    }
                }
            }
            Some(other) => log::warn!("Ignoring {bucket}: expected an array, found {}", json_type(other)),
            None => {}
        }
    }

    log::debug!("Parsed {} entries ({} skipped)", imported.len(), imported.skipped);
    Ok(imported)
}

/// Add imported entries to a blacklist, counting the ones already present.
pub fn merge_import(blacklist: &mut Blacklist, imported: &ImportedEntries) -> ImportStats {
    let mut added = 0usize;
    let mut duplicates = 0usize;

    for bucket in Bucket::ALL {
        for entry in imported.entries(bucket) {
            if blacklist.insert(bucket, entry) {
                added += 1;
            } else {
                duplicates += 1;
            }
        }
    }

    ImportStats {
        read: imported.len(),
        added,
        duplicates,
        skipped: imported.skipped,
    }
}

fn bucket_slot(bucket: Bucket) -> usize {
    match bucket {
        Bucket::Categories => 0,
        Bucket::Channels => 1,
        Bucket::Tags => 2,
        Bucket::Titles => 3,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let imported = parse_import(
            r#"{"categories": ["Slots"], "channels": ["a", 1, "", "b"], "titles": ["~rerun"], "extra": true}"#,
        )
        .unwrap();

        assert_eq!(imported.entries(Bucket::Categories), ["Slots"]);
        assert_eq!(imported.entries(Bucket::Channels), ["a", "b"]);
        assert!(imported.entries(Bucket::Tags).is_empty());
        assert_eq!(imported.skipped, 2);
        assert_eq!(imported.len(), 4);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(parse_import("[1, 2]"), Err(ImportError::NotAnObject("array"))));
        assert!(matches!(parse_import("{"), Err(ImportError::Json(_))));
    }

    #[test]
    fn test_wrong_bucket_type_is_ignored() {
        let imported = parse_import(r#"{"tags": {"drops": 1}}"#).unwrap();
        assert!(imported.is_empty());
    }

    #[test]
    fn test_merge_counts_duplicates() {
        let mut blacklist = Blacklist::new();
        blacklist.insert(Bucket::Channels, "a");
        blacklist.insert(Bucket::Titles, "~rerun");

        let imported = parse_import(r#"{"channels": ["a", "b"], "titles": ["~rerun", "~drops", "~drops"]}"#).unwrap();
        let stats = merge_import(&mut blacklist, &imported);

        assert_eq!(stats.read, 5);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.duplicates, 3);
        assert_eq!(blacklist.titles, vec!["~rerun", "~drops"]);
        assert!(blacklist.contains_key(Bucket::Channels, "b"));
    }
}
