//! Savings recalculation engine
//!
//! Tracks which recommended actions the user has applied, totals their
//! advertised savings and adjusts the next-month forecast. Savings strings
//! come straight from the extraction backend, so parsing never fails: a value
//! that cannot be read contributes nothing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{AnalysisResult, RecommendedAction};
use crate::config::SplitParams;

/// Read a display-formatted amount such as `"$21.50"` or `"Save ~$8/mo"`.
///
/// Everything except ASCII digits and `.` is dropped, then the longest
/// leading decimal number is parsed (`"1.2.3"` reads as 1.2). Returns None
/// when no digits remain.
pub fn parse_savings_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let int_len = cleaned.bytes().take_while(u8::is_ascii_digit).count();
    let mut end = int_len;
    let mut frac_len = 0;
    if cleaned.as_bytes().get(int_len) == Some(&b'.') {
        frac_len = cleaned[int_len + 1..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if frac_len > 0 {
            end = int_len + 1 + frac_len;
        }
    }

    if int_len == 0 && frac_len == 0 {
        return None;
    }
    cleaned[..end].parse().ok()
}

/// Sum of the savings of every applied action. Never negative.
pub fn compute_applied_savings(actions: &[RecommendedAction], applied: &AppliedActionSet) -> f64 {
    actions
        .iter()
        .filter(|a| applied.is_applied(&a.id))
        .filter_map(|a| parse_savings_amount(&a.savings))
        .sum()
}

/// Forecast before savings: the supplied figure if present and non-zero,
/// otherwise the total escalated by `escalation`.
pub fn base_forecast(total: f64, supplied: Option<f64>, escalation: f64) -> f64 {
    match supplied {
        Some(forecast) if forecast != 0.0 && forecast.is_finite() => forecast,
        _ => total * escalation,
    }
}

/// Forecast after savings, clamped at zero
pub fn final_forecast(base: f64, savings: f64) -> f64 {
    (base - savings).max(0.0)
}

/// Ids of actions the user has marked as applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedActionSet {
    ids: BTreeSet<String>,
}

impl AppliedActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip an action between applied and unapplied, returning the new state
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn is_applied(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn reset(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// Savings and forecast for the current applied set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub total_savings: f64,
    pub base_forecast: f64,
    pub final_forecast: f64,
    pub applied_ids: Vec<String>,
}

/// An analysis plus the user's applied actions
#[derive(Debug, Clone)]
pub struct SavingsTracker {
    analysis: AnalysisResult,
    applied: AppliedActionSet,
    escalation: f64,
    summary: ForecastSummary,
}

impl SavingsTracker {
    pub fn new(analysis: AnalysisResult, params: &SplitParams) -> Self {
        let mut tracker = Self {
            analysis,
            applied: AppliedActionSet::new(),
            escalation: params.forecast_escalation,
            summary: ForecastSummary {
                total_savings: 0.0,
                base_forecast: 0.0,
                final_forecast: 0.0,
                applied_ids: Vec::new(),
            },
        };
        tracker.recompute();
        tracker
    }

    /// Replace the analysis. Applied actions never carry over.
    pub fn load(&mut self, analysis: AnalysisResult) {
        self.analysis = analysis;
        self.applied.reset();
        self.recompute();
    }

    /// Toggle an action from the current plan. Unknown ids are ignored.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        self.analysis.find_action(id)?;
        let state = self.applied.toggle(id);
        self.recompute();
        Some(state)
    }

    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    pub fn applied(&self) -> &AppliedActionSet {
        &self.applied
    }

    pub fn summary(&self) -> &ForecastSummary {
        &self.summary
    }

    fn recompute(&mut self) {
        let total_savings = compute_applied_savings(&self.analysis.action_plan, &self.applied);
        let base = base_forecast(
            self.analysis.total_amount,
            self.analysis.next_month_forecast,
            self.escalation,
        );
        self.summary = ForecastSummary {
            total_savings,
            base_forecast: base,
            final_forecast: final_forecast(base, total_savings),
            applied_ids: self.applied.iter().map(str::to_string).collect(),
        };
        debug!(
            applied = self.applied.len(),
            total_savings, "Recomputed savings forecast"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, savings: &str) -> RecommendedAction {
        RecommendedAction {
            id: id.to_string(),
            icon: "zap".to_string(),
            title: format!("Action {}", id),
            description: None,
            savings: savings.to_string(),
        }
    }

    #[test]
    fn test_parse_savings_amount() {
        assert_eq!(parse_savings_amount("$21.50"), Some(21.5));
        assert_eq!(parse_savings_amount("$1,200.00"), Some(1200.0));
        assert_eq!(parse_savings_amount("Save ~$8/mo"), Some(8.0));
        assert_eq!(parse_savings_amount("-$5"), Some(5.0));
        assert_eq!(parse_savings_amount("1.2.3"), Some(1.2));
        assert_eq!(parse_savings_amount(".5"), Some(0.5));
        assert_eq!(parse_savings_amount("7."), Some(7.0));
        assert_eq!(parse_savings_amount(""), None);
        assert_eq!(parse_savings_amount("."), None);
        assert_eq!(parse_savings_amount("N/A"), None);
    }

    #[test]
    fn test_applied_savings_scenario() {
        let actions = vec![action("a1", "$21.50"), action("a2", "$8.00")];
        let mut applied = AppliedActionSet::new();
        applied.toggle("a1");
        assert_eq!(compute_applied_savings(&actions, &applied), 21.5);
    }

    #[test]
    fn test_unparseable_contributes_zero() {
        let actions = vec![action("a1", "lots"), action("a2", "$3.25")];
        let mut applied = AppliedActionSet::new();
        applied.toggle("a1");
        assert_eq!(compute_applied_savings(&actions, &applied), 0.0);
        applied.toggle("a2");
        assert_eq!(compute_applied_savings(&actions, &applied), 3.25);
    }

    #[test]
    fn test_forecast_floor() {
        assert_eq!(final_forecast(150.0, 200.0), 0.0);
        assert_eq!(final_forecast(150.0, 20.0), 130.0);
    }

    #[test]
    fn test_base_forecast_fallback() {
        assert_eq!(base_forecast(100.0, Some(130.0), 1.12), 130.0);
        assert!((base_forecast(100.0, None, 1.12) - 112.0).abs() < 1e-9);
        assert!((base_forecast(100.0, Some(0.0), 1.12) - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_toggle_state_machine() {
        let mut applied = AppliedActionSet::new();
        assert!(applied.toggle("a1"));
        assert!(applied.is_applied("a1"));
        assert!(!applied.toggle("a1"));
        assert!(applied.is_empty());
        applied.toggle("a2");
        applied.toggle("a3");
        assert_eq!(applied.len(), 2);
        applied.reset();
        assert!(applied.is_empty());
    }

    #[test]
    fn test_tracker_recomputes_on_toggle() {
        let analysis = AnalysisResult {
            total_amount: 100.0,
            next_month_forecast: Some(150.0),
            action_plan: vec![action("a1", "$21.50"), action("a2", "$8.00")],
            ..Default::default()
        };
        let mut tracker = SavingsTracker::new(analysis, &SplitParams::default());
        assert_eq!(tracker.summary().total_savings, 0.0);
        assert_eq!(tracker.summary().final_forecast, 150.0);

        assert_eq!(tracker.toggle("a1"), Some(true));
        assert_eq!(tracker.summary().total_savings, 21.5);
        assert_eq!(tracker.summary().final_forecast, 128.5);
        assert_eq!(tracker.summary().applied_ids, vec!["a1".to_string()]);

        assert_eq!(tracker.toggle("unknown"), None);
        assert_eq!(tracker.summary().total_savings, 21.5);
    }

    #[test]
    fn test_tracker_load_resets() {
        let analysis = AnalysisResult {
            total_amount: 100.0,
            action_plan: vec![action("a1", "$200.00")],
            ..Default::default()
        };
        let mut tracker = SavingsTracker::new(analysis.clone(), &SplitParams::default());
        tracker.toggle("a1");
        assert_eq!(tracker.summary().final_forecast, 0.0);

        tracker.load(analysis);
        assert!(tracker.applied().is_empty());
        assert_eq!(tracker.summary().total_savings, 0.0);
        assert!((tracker.summary().final_forecast - 112.0).abs() < 1e-9);
    }
}
