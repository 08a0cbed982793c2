//! Unwanted Blacklist Compiler
//!
//! This crate turns user input into blacklist entries: normalization of
//! typed entries, import of exported files and building of export files.

pub mod entry;
pub mod export;
pub mod import;

pub use entry::{normalize_entry, EntryError};
pub use export::{export_file_name, sorted_entries, ExportDocument};
pub use import::{merge_import, parse_import, ImportError, ImportStats, ImportedEntries};
