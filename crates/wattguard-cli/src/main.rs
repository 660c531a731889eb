//! WattGuard CLI - utility bill analyzer and fair splitter
//!
//! Usage:
//!   wattguard init                           Initialize database
//!   wattguard split --total 300 --person Me  Split a bill across roommates
//!   wattguard analyze --file bill.jpg        Extract a bill with the vision model
//!   wattguard serve --port 3000              Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let split_config = commands::load_split_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Tags => commands::cmd_tags(&split_config),
        Commands::Split {
            total,
            person,
            owner,
            json,
            details,
        } => commands::cmd_split(&split_config, total, &person, owner.as_deref(), json, details),
        Commands::Savings { file, apply, json } => {
            commands::cmd_savings(&split_config, &file, &apply, json)
        }
        Commands::Analyze {
            file,
            save,
            user,
            json,
        } => {
            commands::cmd_analyze(
                &cli.db,
                cli.no_encrypt,
                &split_config,
                &file,
                save,
                &user,
                json,
            )
            .await
        }
        Commands::History { action } => match action {
            HistoryAction::List { user } => {
                commands::cmd_history_list(&cli.db, cli.no_encrypt, &user)
            }
            HistoryAction::Show { id, user } => {
                commands::cmd_history_show(&cli.db, cli.no_encrypt, &split_config, id, &user)
            }
            HistoryAction::Usage { user } => {
                commands::cmd_history_usage(&cli.db, cli.no_encrypt, &user)
            }
            HistoryAction::Delete { id, user } => {
                commands::cmd_history_delete(&cli.db, cli.no_encrypt, id, &user)
            }
        },
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
                split_config,
            )
            .await
        }
    }
}
