//! Unwanted Core Library
//!
//! This crate provides the blacklist matching engine and the storage
//! synchronizer of the Unwanted content filter. It has no browser
//! dependencies: storage backends and the cross-tab channel are traits that
//! the wasm crate implements against the extension APIs and the CLI
//! implements on disk.
//!
//! # Architecture
//!
//! A blacklist holds four buckets of terms. Every term is classified once
//! into exact, loose, regex or plain form and compiled into a per-bucket
//! match cache, so matching a scraped item is a handful of lookups. The
//! synchronizer persists the blacklist into the size-limited sync area
//! (splitting it into fragments when needed) or the local area, and
//! broadcasts successful saves to the other tabs.
//!
//! # Modules
//!
//! - `types`: Buckets, scraped items and match reasons
//! - `term`: Term classification and regex literals
//! - `blacklist`: The four-bucket blacklist and its tolerant loader
//! - `cache`: Per-bucket match caches
//! - `matcher`: Term and item matching
//! - `settings`: Persisted preferences
//! - `storage`: Storage area trait, in-memory backend and fragment codec
//! - `sync`: Blacklist persistence with bounded recovery
//! - `message`: Cross-tab messages and the publisher trait
//! - `dispatch`: Background forwarding with writer election
//! - `guard`: Filter pass re-entrancy guards
//! - `confirm`: Save confirmation with timeout
//! - `controller`: Per-tab context tying everything together

pub mod blacklist;
pub mod cache;
pub mod confirm;
pub mod controller;
pub mod dispatch;
pub mod guard;
pub mod matcher;
pub mod message;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod term;
pub mod types;

// Re-export commonly used types
pub use blacklist::Blacklist;
pub use cache::MatchCache;
pub use controller::{Controller, Directive, MessageOutcome};
pub use matcher::Matcher;
pub use message::{Message, PublishError, Publisher, SaveResponse};
pub use settings::{Settings, StorageMode};
pub use storage::{StorageArea, StorageError, StorageQuota};
pub use sync::{BlacklistStore, SaveError, SaveReport};
pub use term::{Term, TermError, TermRegex};
pub use types::{Bucket, MatchReason, ScrapedItem, Surface};
