//! CLI argument definitions using clap
//!
//! The command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Name used for history records when no identity is given. Matches the
/// identity the server assigns when running with --no-auth.
pub const LOCAL_USER: &str = "local-dev";

/// WattGuard - understand your power bill and split it fairly
#[derive(Parser)]
#[command(name = "wattguard")]
#[command(about = "Utility bill analyzer and fair splitter", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "wattguard.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set WATTGUARD_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Split configuration file (tag weights and heuristics)
    ///
    /// Defaults to ~/.local/share/wattguard/config/split.toml when present,
    /// otherwise the built-in configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// List usage tags and their weights
    Tags,

    /// Split a bill across roommates by usage tags
    Split {
        /// Bill total in dollars
        #[arg(short, long)]
        total: f64,

        /// Participant as "Name" or "Name:Tag,Tag" (repeatable).
        /// Without any, splits between you and "Roommate 1".
        #[arg(short, long)]
        person: Vec<String>,

        /// Your email, used to name the default first participant
        #[arg(long, conflicts_with = "person")]
        owner: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Show how each share was calculated
        #[arg(long)]
        details: bool,
    },

    /// Recalculate savings and next month's forecast from an analysis
    Savings {
        /// Analysis JSON file (as produced by `analyze --json`)
        #[arg(short, long)]
        file: PathBuf,

        /// Recommended action id to apply (repeatable)
        #[arg(short, long)]
        apply: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a bill from photos or a PDF with the vision model
    Analyze {
        /// Bill page (repeatable, all pages of the same bill)
        #[arg(short, long, required = true)]
        file: Vec<PathBuf>,

        /// Store the result in history
        #[arg(long)]
        save: bool,

        /// Owner of the stored record
        #[arg(long, default_value = LOCAL_USER)]
        user: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse stored analyses
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// By default, requires a Cloudflare Access header or an API key
        /// from WATTGUARD_API_KEYS. Use --no-auth for local development.
        #[arg(long)]
        no_auth: bool,

        /// Directory of static files for the web UI
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List analyses, newest first
    List {
        #[arg(long, default_value = LOCAL_USER)]
        user: String,
    },

    /// Show one analysis with its summary
    Show {
        /// Analysis ID
        id: i64,

        #[arg(long, default_value = LOCAL_USER)]
        user: String,
    },

    /// Month-by-month usage across history
    Usage {
        #[arg(long, default_value = LOCAL_USER)]
        user: String,
    },

    /// Delete an analysis
    Delete {
        /// Analysis ID
        id: i64,

        #[arg(long, default_value = LOCAL_USER)]
        user: String,
    },
}
