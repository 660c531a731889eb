//! Web server command

use std::path::Path;

use anyhow::{Context, Result};
use wattguard_core::SplitConfig;

use super::open_db;

/// Split a comma-separated environment variable into trimmed, non-empty values
fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    split_config: SplitConfig,
) -> Result<()> {
    println!("Starting WattGuard web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let api_keys = env_list("WATTGUARD_API_KEYS");
    let allowed_origins = env_list("WATTGUARD_CORS_ORIGINS");

    if no_auth {
        println!();
        println!("   Authentication DISABLED - do not expose to network!");
    } else {
        println!("   Authentication: Cloudflare Access header");
        if !api_keys.is_empty() {
            println!(
                "   API keys: {} configured (WATTGUARD_API_KEYS)",
                api_keys.len()
            );
        }
    }
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    if no_encrypt {
        println!("   Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = wattguard_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins,
        api_keys,
    };

    let static_dir_str = static_dir
        .map(|p| {
            p.to_str()
                .with_context(|| format!("Static dir is not valid UTF-8: {}", p.display()))
        })
        .transpose()?;
    wattguard_server::serve_with_config(db, host, port, static_dir_str, config, split_config)
        .await?;

    Ok(())
}
