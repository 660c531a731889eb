//! Bill analysis command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use wattguard_core::extract::content_hash;
use wattguard_core::{
    AnalysisResult, BillExtractor, BillImage, BillSummary, Database, ExtractorClient, SplitConfig,
};

use super::open_db;

/// MIME type implied by a file extension, if it is one we accept
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Load and validate every page of a bill
pub fn read_bill_pages(files: &[PathBuf]) -> Result<Vec<BillImage>> {
    files
        .iter()
        .map(|path| {
            let data =
                std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path.file_name().and_then(|n| n.to_str());
            BillImage::new(data, mime_from_extension(path), filename)
                .with_context(|| format!("Cannot analyze {}", path.display()))
        })
        .collect()
}

/// Outcome of analyzing one bill
#[derive(Debug)]
pub struct AnalyzeOutcome {
    pub id: Option<i64>,
    /// Result came from history instead of the vision model
    pub duplicate: bool,
    pub result: AnalysisResult,
}

/// Run extraction, storing the result when a database is given.
///
/// A bill already stored for this user is returned from history without
/// calling the vision model again.
pub async fn analyze_pages(
    extractor: &ExtractorClient,
    db: Option<&Database>,
    pages: &[BillImage],
    user: &str,
) -> Result<AnalyzeOutcome> {
    let hash = content_hash(pages);

    if let Some(db) = db {
        if let Some(id) = db.find_by_hash(user, &hash)? {
            if let Some(detail) = db.get_history_detail(id)? {
                return Ok(AnalyzeOutcome {
                    id: Some(id),
                    duplicate: true,
                    result: detail.result,
                });
            }
        }
    }

    let result = extractor
        .analyze_bill(pages)
        .await
        .context("Bill analysis failed")?;

    let id = match db {
        Some(db) => {
            let names: Vec<&str> = pages.iter().filter_map(|p| p.filename.as_deref()).collect();
            let file_url = (!names.is_empty()).then(|| names.join(", "));
            Some(db.save_analysis(user, file_url.as_deref(), Some(hash.as_str()), &result)?)
        }
        None => None,
    };

    Ok(AnalyzeOutcome {
        id,
        duplicate: false,
        result,
    })
}

pub fn print_summary(summary: &BillSummary) {
    println!("Total:        ${:.2}", summary.total_amount);
    println!(
        "Usage:        {:.0} kWh ({:.0} kWh/day)",
        summary.usage_kwh, summary.daily_avg_kwh
    );
    if let Some(previous) = summary.previous_usage_kwh {
        println!(
            "Last month:   {:.0} kWh ({:+.0} kWh)",
            previous, summary.usage_delta_kwh
        );
    }
    if let (Some(estimate), Some(delta)) = (summary.estimated_previous_bill, summary.bill_delta) {
        println!("Last bill:    ~${:.2} ({:+.2})", estimate, delta);
    }
    println!("Next month:   ${:.2} (forecast)", summary.next_month_forecast);

    if !summary.breakdown.is_empty() {
        println!();
        println!("Breakdown:");
        for line in &summary.breakdown {
            println!(
                "  {:<24} ${:>8.2} {:>5.1}%",
                line.category, line.amount, line.percent
            );
        }
    }
}

pub async fn cmd_analyze(
    db_path: &Path,
    no_encrypt: bool,
    config: &SplitConfig,
    files: &[PathBuf],
    save: bool,
    user: &str,
    json: bool,
) -> Result<()> {
    let extractor = ExtractorClient::from_env().context(
        "No vision backend configured. Set OPENAI_COMPATIBLE_HOST (or AI_BACKEND=mock for a demo)",
    )?;
    let pages = read_bill_pages(files)?;
    let db = if save {
        Some(open_db(db_path, no_encrypt)?)
    } else {
        None
    };

    if !json {
        println!(
            "Analyzing {} page(s) with {} ({})...",
            pages.len(),
            extractor.model(),
            extractor.host()
        );
    }

    let outcome = analyze_pages(&extractor, db.as_ref(), &pages, user).await?;
    let summary = outcome.result.summary(&config.params);

    if json {
        let out = serde_json::json!({
            "id": outcome.id,
            "duplicate": outcome.duplicate,
            "result": outcome.result,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    print_summary(&summary);

    if !outcome.result.action_plan.is_empty() {
        println!();
        println!("Recommended actions:");
        for action in &outcome.result.action_plan {
            println!("  {:<12} {:<40} {}", action.id, action.title, action.savings);
        }
    }

    println!();
    match (outcome.id, outcome.duplicate) {
        (Some(id), true) => println!("Already analyzed: history #{}", id),
        (Some(id), false) => println!("Saved to history as #{}", id),
        (None, _) => println!("Not saved (use --save to keep it)"),
    }

    Ok(())
}
