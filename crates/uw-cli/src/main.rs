//! Unwanted CLI
//!
//! CLI tool for testing blacklists and emulating the extension's storage.

mod logger;
mod store;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use uw_compiler::{export_file_name, merge_import, normalize_entry, parse_import, ExportDocument};
use uw_core::message::NullPublisher;
use uw_core::{
    BlacklistStore, Bucket, MatchCache, Matcher, ScrapedItem, Settings, StorageMode, StorageQuota,
};

use store::{open_store, read_blacklist_file, write_json};

#[derive(Parser)]
#[command(name = "uw-cli")]
#[command(about = "Unwanted blacklist tools")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a term against one bucket of a blacklist
    Match {
        /// Blacklist file (storage or export format)
        #[arg(short, long)]
        blacklist: PathBuf,

        /// Bucket to match in (categories, channels, tags, titles)
        #[arg(long)]
        bucket: Bucket,

        /// Term to match
        term: String,
    },

    /// Classify scraped items from a JSON array
    Check {
        #[arg(short, long)]
        blacklist: PathBuf,

        /// JSON file holding an array of scraped items
        #[arg(short, long)]
        items: PathBuf,

        /// Hide reruns too
        #[arg(long)]
        hide_reruns: bool,
    },

    /// Normalize entries the way the management page does
    Normalize {
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// Merge an export file into a blacklist
    Import {
        /// Export file to import
        #[arg(short, long)]
        input: PathBuf,

        /// Blacklist to merge into (defaults to an empty one)
        #[arg(long)]
        into: Option<PathBuf>,

        /// Output blacklist file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a blacklist as an export file
    Export {
        #[arg(short, long)]
        blacklist: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Save a blacklist into an emulated storage directory
    Save {
        #[arg(short, long)]
        blacklist: PathBuf,

        /// Switch the store to the local area first
        #[arg(long)]
        local: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Load the blacklist from an emulated storage directory
    Load {
        #[command(flatten)]
        store: StoreArgs,

        /// Write the blacklist here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// Storage directory holding sync.json and local.json
    #[arg(short, long, default_value = "uw-store")]
    store: PathBuf,

    /// Bytes per sync item
    #[arg(long, default_value_t = StorageQuota::SYNC.quota_bytes_per_item)]
    quota_bytes_per_item: usize,

    /// Maximum number of sync items
    #[arg(long, default_value_t = StorageQuota::SYNC.max_items)]
    max_items: usize,

    /// Bytes for the whole sync area
    #[arg(long, default_value_t = StorageQuota::SYNC.quota_bytes)]
    quota_bytes: usize,
}

impl StoreArgs {
    fn quota(&self) -> StorageQuota {
        StorageQuota {
            quota_bytes_per_item: self.quota_bytes_per_item,
            max_items: self.max_items,
            quota_bytes: self.quota_bytes,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = match cli.command {
        Commands::Match { blacklist, bucket, term } => cmd_match(&blacklist, bucket, &term),
        Commands::Check {
            blacklist,
            items,
            hide_reruns,
        } => cmd_check(&blacklist, &items, hide_reruns),
        Commands::Normalize { entries } => cmd_normalize(&entries),
        Commands::Import { input, into, output } => cmd_import(&input, into.as_deref(), &output),
        Commands::Export { blacklist, output } => cmd_export(&blacklist, &output),
        Commands::Save { blacklist, local, store } => cmd_save(&blacklist, local, &store).await,
        Commands::Load { store, output } => cmd_load(&store, output.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_match(blacklist: &Path, bucket: Bucket, term: &str) -> Result<(), String> {
    let blacklist = read_blacklist_file(blacklist)?;
    let cache = MatchCache::build(&blacklist);
    let matched = Matcher::new(&blacklist, &cache).matches(term, bucket);

    println!("{} '{}' in {}", if matched { "MATCH" } else { "no match" }, term, bucket);
    Ok(())
}

fn cmd_check(blacklist: &Path, items: &Path, hide_reruns: bool) -> Result<(), String> {
    let blacklist = read_blacklist_file(blacklist)?;
    let text = fs::read_to_string(items).map_err(|e| format!("Failed to read '{}': {}", items.display(), e))?;
    let items: Vec<ScrapedItem> =
        serde_json::from_str(&text).map_err(|e| format!("Invalid items in '{}': {}", items.display(), e))?;

    let cache = MatchCache::build(&blacklist);
    let matcher = Matcher::new(&blacklist, &cache);
    let settings = Settings {
        hide_reruns,
        ..Settings::default()
    };

    let mut hidden = 0usize;
    for item in &items {
        match matcher.match_item(item, &settings) {
            Some(reason) => {
                hidden += 1;
                println!("  hide  {} ({})", item.identifier(), reason);
            }
            None => println!("  keep  {}", item.identifier()),
        }
    }
    println!("Hidden {} of {} items", hidden, items.len());
    Ok(())
}

fn cmd_normalize(entries: &[String]) -> Result<(), String> {
    for raw in entries {
        match normalize_entry(raw).map_err(|e| format!("'{}': {}", raw, e))? {
            Some(entry) => println!("{entry}"),
            None => println!("(empty)"),
        }
    }
    Ok(())
}

fn cmd_import(input: &Path, into: Option<&Path>, output: &Path) -> Result<(), String> {
    let mut blacklist = match into {
        Some(path) => read_blacklist_file(path)?,
        None => Default::default(),
    };
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    let imported = parse_import(&text).map_err(|e| format!("Import failed: {}", e))?;
    let stats = merge_import(&mut blacklist, &imported);

    write_json(output, &blacklist.to_value())?;

    println!("Imported '{}' into '{}'", input.display(), output.display());
    println!("  Read:        {}", stats.read);
    println!("  Added:       {}", stats.added);
    println!("  Duplicates:  {}", stats.duplicates);
    println!("  Skipped:     {}", stats.skipped);
    Ok(())
}

fn cmd_export(blacklist: &Path, output: &Path) -> Result<(), String> {
    let blacklist = read_blacklist_file(blacklist)?;
    let json = ExportDocument::from_blacklist(&blacklist)
        .to_json()
        .map_err(|e| format!("Failed to serialize: {}", e))?;

    let today = chrono::Local::now().date_naive();
    let path = output.join(export_file_name(today.day(), today.month(), today.year()));
    fs::create_dir_all(output).map_err(|e| format!("Failed to create '{}': {}", output.display(), e))?;
    fs::write(&path, json).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;

    println!("Exported {} entries to '{}'", blacklist.total_len(), path.display());
    Ok(())
}

async fn cmd_save(blacklist: &Path, force_local: bool, args: &StoreArgs) -> Result<(), String> {
    let blacklist = read_blacklist_file(blacklist)?;
    let quota = args.quota();
    let (sync, local) = open_store(&args.store, quota)?;
    let store = BlacklistStore::with_quota(sync, local, NullPublisher, quota);

    if force_local {
        store
            .set_storage_mode(StorageMode::Local)
            .await
            .map_err(|e| format!("Failed to switch to local storage: {}", e))?;
    }

    // Seeds the backup used if the write has to be retried
    store.load().await;
    let report = store.put(&blacklist).await.map_err(|e| e.to_string())?;

    println!("Saved {} entries to {} storage", report.stored.total_len(), report.mode.as_str());
    if report.switched_to_local {
        println!("  Switched to local storage");
    }
    if report.used_backup(&blacklist) {
        println!("  Requested blacklist was not saved; restored the previous one");
    }
    for alert in &report.alerts {
        println!("  Alert:       {}", alert.as_str());
    }
    Ok(())
}

async fn cmd_load(args: &StoreArgs, output: Option<&Path>) -> Result<(), String> {
    let quota = args.quota();
    let (sync, local) = open_store(&args.store, quota)?;
    let store = BlacklistStore::with_quota(sync, local, NullPublisher, quota);

    let mode = store.storage_mode().await;
    let blacklist = store.load().await;
    let value: Value = blacklist.to_value();

    match output {
        Some(path) => {
            write_json(path, &value)?;
            println!(
                "Loaded {} entries from {} storage into '{}'",
                blacklist.total_len(),
                mode.as_str(),
                path.display()
            );
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&value).map_err(|e| format!("Failed to serialize: {}", e))?
        ),
    }
    Ok(())
}
