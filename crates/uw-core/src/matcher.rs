//! Core Matching Engine
//!
//! Every scraped item of every filter pass goes through here. Checks run in a
//! fixed order and stop at the first hit: key lookup, exact values, loose
//! values, patterns.

use crate::blacklist::Blacklist;
use crate::cache::{BucketCache, MatchCache};
use crate::settings::Settings;
use crate::term::normalize_case;
use crate::types::{Bucket, MatchReason, ScrapedItem};

// =============================================================================
// Matcher
// =============================================================================

/// Read-only view over a blacklist and its caches.
#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    blacklist: &'a Blacklist,
    cache: &'a MatchCache,
}

impl<'a> Matcher<'a> {
    /// Create a matcher. The cache must have been built from `blacklist`.
    pub fn new(blacklist: &'a Blacklist, cache: &'a MatchCache) -> Self {
        Self { blacklist, cache }
    }

    /// Returns if the term matches any entry of the bucket.
    pub fn matches(&self, term: &str, bucket: Bucket) -> bool {
        if term.is_empty() || self.blacklist.len(bucket) == 0 {
            return false;
        }

        let term_lower = normalize_case(term);

        // Plain terms are stored as keys, which covers the common case
        if bucket.is_map()
            && (self.blacklist.contains_key(bucket, term)
                || self.blacklist.contains_key(bucket, &term_lower))
        {
            return true;
        }

        match_cached(self.cache.bucket(bucket), term, &term_lower)
    }

    /// Returns if the item should be hidden.
    pub fn is_blacklisted_item(&self, item: &ScrapedItem, settings: &Settings) -> bool {
        self.match_item(item, settings).is_some()
    }

    /// Returns the first reason the item should be hidden, if any.
    pub fn match_item(&self, item: &ScrapedItem, settings: &Settings) -> Option<MatchReason> {
        log::trace!(
            "Checking: type={:?}, name='{}', category='{}', title='{}', rerun={}",
            item.item_type,
            item.name,
            item.category,
            item.title,
            item.rerun
        );

        let reason = self.find_reason(item, settings);
        match &reason {
            Some(reason) => log::info!("Blacklisted: {} - {}", reason, item.identifier()),
            None => log::trace!("Not blacklisted: {}", item.identifier()),
        }
        reason
    }

    fn find_reason(&self, item: &ScrapedItem, settings: &Settings) -> Option<MatchReason> {
        if settings.hide_reruns && item.rerun {
            return Some(MatchReason::Rerun);
        }

        if let Some(bucket) = item.item_type {
            if self.matches(item.own_name(), bucket) {
                return Some(MatchReason::Name(bucket));
            }

            if bucket == Bucket::Channels && self.matches(&item.category, Bucket::Categories) {
                return Some(MatchReason::Category);
            }
        }

        if let Some(tag) = item.tags.iter().find(|tag| self.matches(&tag.name, Bucket::Tags)) {
            return Some(MatchReason::Tag(tag.name.clone()));
        }

        if self.matches(&item.title, Bucket::Titles) {
            return Some(MatchReason::Title);
        }

        None
    }
}

fn match_cached(cache: &BucketCache, term: &str, term_lower: &str) -> bool {
    cache.exact.iter().any(|exact| exact == term)
        || cache.loose.iter().any(|loose| term_lower.contains(loose.as_str()))
        || cache.regexps.iter().any(|re| re.is_match(term))
}
