//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_split_config` - Resolve the split configuration
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use wattguard_core::config::default_config_path;
use wattguard_core::{db::Database, SplitConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Explicit --config file, else the data-dir override, else the built-in defaults
pub fn load_split_config(path: Option<&Path>) -> Result<SplitConfig> {
    match path {
        Some(path) if !path.exists() => bail!("Config file not found: {}", path.display()),
        Some(path) => SplitConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => SplitConfig::load().context("Failed to load split configuration"),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if db.is_encrypted() {
        println!("   Encryption: ENABLED");
    } else {
        println!("   Encryption: DISABLED (--no-encrypt)");
    }

    match default_config_path() {
        Some(path) if path.exists() => println!("   Split config: {}", path.display()),
        Some(path) => println!("   Split config: built-in (override at {})", path.display()),
        None => println!("   Split config: built-in"),
    }

    println!("Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Analyze a bill: wattguard analyze --file bill.jpg --save");
    println!("  2. Split it: wattguard split --total 142.50 --person \"Me:Gaming PC\" --person Sam");
    println!("  3. Start web UI: wattguard serve");

    Ok(())
}
