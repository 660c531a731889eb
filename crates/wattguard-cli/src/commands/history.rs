//! History commands

use std::path::Path;

use anyhow::{bail, Result};
use wattguard_core::{Database, HistoryDetail, SplitConfig};

use super::{open_db, print_summary};

/// Fetch a record owned by `user`
pub fn owned_detail(db: &Database, id: i64, user: &str) -> Result<HistoryDetail> {
    match db.get_history_detail(id)? {
        Some(detail) if detail.user_email == user => Ok(detail),
        _ => bail!("Analysis #{} not found for {}", id, user),
    }
}

pub fn cmd_history_list(db_path: &Path, no_encrypt: bool, user: &str) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let items = db.list_history(user)?;

    if items.is_empty() {
        println!("No analyses stored for {}.", user);
        return Ok(());
    }

    println!(
        "{:>5}  {:<16}  {:>10}  {:>8}  {:<12}  File",
        "ID", "Created", "Total", "kWh", "Billed"
    );
    println!("{}", "-".repeat(72));
    for item in items {
        println!(
            "{:>5}  {:<16}  {:>10}  {:>8.0}  {:<12}  {}",
            item.id,
            item.created_at.format("%Y-%m-%d %H:%M"),
            format!("${:.2}", item.total_amount),
            item.usage_kwh,
            item.billing_date.as_deref().unwrap_or("-"),
            item.file_url.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}

pub fn cmd_history_show(
    db_path: &Path,
    no_encrypt: bool,
    config: &SplitConfig,
    id: i64,
    user: &str,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let detail = owned_detail(&db, id, user)?;

    println!("Analysis #{} ({})", detail.id, detail.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(file) = &detail.file_url {
        println!("File:         {}", file);
    }
    if let Some(date) = &detail.result.billing_date {
        println!("Billed:       {}", date);
    }
    print_summary(&detail.result.summary(&config.params));

    if !detail.result.ai_analysis.is_empty() {
        println!();
        println!("Insights:");
        for insight in &detail.result.ai_analysis {
            println!("  - {}: {}", insight.title, insight.description);
        }
    }

    if !detail.result.action_plan.is_empty() {
        println!();
        println!("Recommended actions:");
        for action in &detail.result.action_plan {
            println!("  {:<12} {:<40} {}", action.id, action.title, action.savings);
        }
    }

    Ok(())
}

pub fn cmd_history_usage(db_path: &Path, no_encrypt: bool, user: &str) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let points = db.monthly_usage_history(user)?;

    if points.is_empty() {
        println!("No usage history for {}.", user);
        return Ok(());
    }

    let max = points.iter().map(|p| p.usage).fold(0.0_f64, f64::max);
    for point in &points {
        let width = if max > 0.0 {
            (point.usage / max * 40.0).round() as usize
        } else {
            0
        };
        println!("{:<4} {:>7.0} kWh  {}", point.month, point.usage, "#".repeat(width));
    }

    Ok(())
}

pub fn cmd_history_delete(db_path: &Path, no_encrypt: bool, id: i64, user: &str) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    owned_detail(&db, id, user)?;

    if db.delete_analysis(id)? {
        println!("Deleted analysis #{}", id);
    } else {
        bail!("Analysis #{} not found", id);
    }

    Ok(())
}
