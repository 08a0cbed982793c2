//! Match cache
//!
//! Prefix-tagged entries are parsed once per mutation instead of on every
//! match check. For each bucket three lists are kept: exact values, lowercased
//! loose values and compiled patterns. Plain entries of map buckets are not
//! cached since the matcher finds them by key; plain titles are folded into the
//! loose list.

use crate::blacklist::Blacklist;
use crate::term::{classify, normalize_case, Term, TermRegex};
use crate::types::Bucket;

/// Derived lookup lists for one bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketCache {
    pub exact: Vec<String>,
    pub loose: Vec<String>,
    pub regexps: Vec<TermRegex>,
}

impl BucketCache {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.loose.is_empty() && self.regexps.is_empty()
    }

    fn clear(&mut self) {
        self.exact.clear();
        self.loose.clear();
        self.regexps.clear();
    }

    fn push_exact(&mut self, value: &str) {
        if !self.exact.iter().any(|v| v == value) {
            self.exact.push(value.to_string());
        }
    }

    fn push_loose(&mut self, value: &str) {
        // An empty loose value would match every candidate
        if value.is_empty() {
            log::warn!("Skipping loose term without a value");
            return;
        }
        let value = normalize_case(value);
        if !self.loose.contains(&value) {
            self.loose.push(value);
        }
    }

    fn push_regexp(&mut self, literal: &str) {
        match TermRegex::parse(literal) {
            Ok(regex) => {
                if !self.regexps.iter().any(|r| r.as_str() == regex.as_str()) {
                    self.regexps.push(regex);
                }
            }
            Err(e) => log::warn!("Skipping stored pattern: {e}"),
        }
    }
}

/// Per-bucket caches for a whole blacklist.
#[derive(Debug, Clone, Default)]
pub struct MatchCache {
    buckets: [BucketCache; 4],
}

impl MatchCache {
    /// Build caches for every bucket of the given blacklist.
    pub fn build(blacklist: &Blacklist) -> Self {
        let mut cache = Self::default();
        cache.rebuild_all(blacklist);
        cache
    }

    #[inline]
    pub fn bucket(&self, bucket: Bucket) -> &BucketCache {
        &self.buckets[bucket.index()]
    }

    /// Clear and repopulate the lists of one bucket.
    pub fn rebuild(&mut self, blacklist: &Blacklist, bucket: Bucket) {
        let cache = &mut self.buckets[bucket.index()];
        cache.clear();

        for entry in blacklist.entries(bucket) {
            match classify(entry) {
                Term::Exact(value) => cache.push_exact(value),
                Term::Loose(value) => cache.push_loose(value),
                Term::RegExp(literal) => cache.push_regexp(literal),
                Term::Plain(value) if !bucket.is_map() => cache.push_loose(value),
                Term::Plain(_) => {}
            }
        }

        log::debug!(
            "Rebuilt {bucket} cache: {} exact, {} loose, {} patterns",
            cache.exact.len(),
            cache.loose.len(),
            cache.regexps.len()
        );
    }

    pub fn rebuild_all(&mut self, blacklist: &Blacklist) {
        for bucket in Bucket::ALL {
            self.rebuild(blacklist, bucket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist_with(bucket: Bucket, entries: &[&str]) -> Blacklist {
        let mut blacklist = Blacklist::new();
        for entry in entries {
            blacklist.insert(bucket, entry);
        }
        blacklist
    }

    #[test]
    fn splits_entries_by_form() {
        let blacklist = blacklist_with(Bucket::Channels, &["'Exact'", "~Loose", "/^re/i", "plain"]);
        let cache = MatchCache::build(&blacklist);
        let channels = cache.bucket(Bucket::Channels);

        assert_eq!(channels.exact, vec!["Exact"]);
        assert_eq!(channels.loose, vec!["loose"]);
        assert_eq!(channels.regexps.len(), 1);
        assert!(cache.bucket(Bucket::Tags).is_empty());
    }

    #[test]
    fn deduplicates_each_list() {
        let blacklist = blacklist_with(Bucket::Titles, &["~Poker", "~poker", "poker", "/a/gi", "/a/ig", "'X'", "'X'"]);
        let cache = MatchCache::build(&blacklist);
        let titles = cache.bucket(Bucket::Titles);

        assert_eq!(titles.loose, vec!["poker"]);
        assert_eq!(titles.regexps.len(), 1);
        assert_eq!(titles.exact, vec!["X"]);
    }

    #[test]
    fn skips_invalid_patterns_and_empty_loose_terms() {
        let blacklist = blacklist_with(Bucket::Tags, &["/(unclosed/", "~"]);
        let cache = MatchCache::build(&blacklist);
        assert!(cache.bucket(Bucket::Tags).is_empty());
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut blacklist = blacklist_with(Bucket::Categories, &["~slots"]);
        let mut cache = MatchCache::build(&blacklist);
        blacklist.clear(Bucket::Categories);
        blacklist.insert(Bucket::Categories, "~poker");
        cache.rebuild(&blacklist, Bucket::Categories);

        assert_eq!(cache.bucket(Bucket::Categories).loose, vec!["poker"]);
    }
}
