//! Savings recalculation command

use std::path::Path;

use anyhow::{Context, Result};
use wattguard_core::{AnalysisResult, ForecastSummary, SavingsTracker, SplitConfig};

/// Read an analysis from a JSON file.
///
/// Accepts a bare analysis or the `analyze --json` envelope with the
/// analysis under `result`.
pub fn load_analysis(path: &Path) -> Result<AnalysisResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    if value.get("result").is_some_and(serde_json::Value::is_object) {
        value = value["result"].take();
    }

    serde_json::from_value(value).with_context(|| format!("Invalid analysis in {}", path.display()))
}

/// Apply the given action ids once each and return the tracker
pub fn apply_actions(analysis: AnalysisResult, config: &SplitConfig, ids: &[String]) -> SavingsTracker {
    let mut tracker = SavingsTracker::new(analysis, &config.params);
    for id in ids {
        if tracker.applied().is_applied(id) {
            continue;
        }
        if tracker.toggle(id).is_none() {
            eprintln!("Warning: no recommended action with id {:?}", id);
        }
    }
    tracker
}

pub fn cmd_savings(config: &SplitConfig, file: &Path, apply: &[String], json: bool) -> Result<()> {
    let analysis = load_analysis(file)?;
    let tracker = apply_actions(analysis, config, apply);
    let forecast: &ForecastSummary = tracker.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(forecast)?);
        return Ok(());
    }

    let actions = &tracker.analysis().action_plan;
    if actions.is_empty() {
        println!("No recommended actions in this analysis.");
    } else {
        println!("Recommended actions:");
        for action in actions {
            let mark = if tracker.applied().is_applied(&action.id) {
                "[x]"
            } else {
                "[ ]"
            };
            println!("  {} {:<12} {:<40} {}", mark, action.id, action.title, action.savings);
        }
    }

    println!();
    println!("Total savings:      ${:.2}", forecast.total_savings);
    println!("Forecast (before):  ${:.2}", forecast.base_forecast);
    println!("Forecast (after):   ${:.2}", forecast.final_forecast);

    Ok(())
}
