//! Bill analysis schema and derived summary figures
//!
//! `AnalysisResult` is the document returned by the extraction backend and
//! stored verbatim in history. Vision models are loose with types (numbers as
//! strings, `null` where a list belongs), so every field deserializes
//! leniently and falls back to an empty/zero value.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::SplitParams;
use crate::savings::base_forecast;

/// Days used to derive the daily average from a monthly bill
pub const DAYS_PER_BILLING_PERIOD: f64 = 30.0;

/// One month of the usage chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub month: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usage: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temp: f64,
}

/// A root-cause observation about the bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsight {
    #[serde(default, deserialize_with = "lenient_string")]
    pub icon: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

/// A recommended action with display-formatted savings (e.g. "$21.50")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub icon: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub savings: String,
}

/// Full extraction result for one bill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_amount: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usage_kwh: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub previous_usage_kwh: Option<f64>,
    #[serde(default, deserialize_with = "lenient_breakdown")]
    pub breakdown_json: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tips_json: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub next_month_forecast: Option<f64>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub monthly_usage: Vec<MonthlyUsage>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub ai_analysis: Vec<AiInsight>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub action_plan: Vec<RecommendedAction>,
}

/// A breakdown category with its share of the itemized charges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub category: String,
    pub amount: f64,
    pub percent: f64,
}

/// Headline figures shown alongside an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummary {
    pub total_amount: f64,
    pub usage_kwh: f64,
    pub daily_avg_kwh: f64,
    pub previous_usage_kwh: Option<f64>,
    pub usage_delta_kwh: f64,
    /// Previous bill estimated from its usage at the configured $/kWh
    pub estimated_previous_bill: Option<f64>,
    pub bill_delta: Option<f64>,
    pub next_month_forecast: f64,
    pub breakdown: Vec<BreakdownLine>,
}

impl AnalysisResult {
    pub fn find_action(&self, id: &str) -> Option<&RecommendedAction> {
        self.action_plan.iter().find(|a| a.id == id)
    }

    /// Previous month usage, treating a reported zero as absent
    pub fn previous_usage(&self) -> Option<f64> {
        self.previous_usage_kwh.filter(|u| *u > 0.0)
    }

    pub fn summary(&self, params: &SplitParams) -> BillSummary {
        let previous = self.previous_usage();
        let estimated_previous_bill = previous.map(|u| u * params.kwh_rate_estimate);

        let itemized: f64 = self.breakdown_json.values().sum();
        let mut breakdown: Vec<BreakdownLine> = self
            .breakdown_json
            .iter()
            .map(|(category, amount)| BreakdownLine {
                category: category.clone(),
                amount: *amount,
                percent: if itemized > 0.0 {
                    amount / itemized * 100.0
                } else {
                    0.0
                },
            })
            .collect();
        breakdown.sort_by(|a, b| b.amount.total_cmp(&a.amount));

        BillSummary {
            total_amount: self.total_amount,
            usage_kwh: self.usage_kwh,
            daily_avg_kwh: (self.usage_kwh / DAYS_PER_BILLING_PERIOD).round(),
            previous_usage_kwh: previous,
            usage_delta_kwh: self.usage_kwh - previous.unwrap_or(0.0),
            estimated_previous_bill,
            bill_delta: estimated_previous_bill.map(|prev| self.total_amount - prev),
            next_month_forecast: base_forecast(
                self.total_amount,
                self.next_month_forecast,
                params.forecast_escalation,
            ),
            breakdown,
        }
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value_as_f64(&value).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value_as_f64(&value))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_breakdown<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    let value = Value::deserialize(d)?;
    let Value::Object(map) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .iter()
        .filter_map(|(k, v)| value_as_f64(v).map(|amount| (k.clone(), amount)))
        .collect())
}

/// Deserialize a list, skipping malformed items and treating non-lists as empty
fn lenient_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnalysisResult {
        serde_json::from_str(
            r#"{
                "total_amount": 142.50,
                "usage_kwh": 455,
                "previous_usage_kwh": 400,
                "breakdown_json": {"Delivery": 50, "Generation": 92.5},
                "tips_json": ["Unplug idle devices"],
                "billing_date": "2026-03-01",
                "next_month_forecast": 150,
                "monthly_usage": [{"month": "Jan", "usage": 320, "temp": -5}],
                "ai_analysis": [{"icon": "dollar", "title": "High generation", "description": "$92.50 is 65%"}],
                "action_plan": [
                    {"id": "action-1", "icon": "zap", "title": "Shift laundry", "savings": "$21.50"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_full_document() {
        let result = sample();
        assert_eq!(result.total_amount, 142.5);
        assert_eq!(result.usage_kwh, 455.0);
        assert_eq!(result.previous_usage_kwh, Some(400.0));
        assert_eq!(result.breakdown_json.len(), 2);
        assert_eq!(result.monthly_usage[0].temp, -5.0);
        assert_eq!(result.action_plan[0].savings, "$21.50");
        assert!(result.action_plan[0].description.is_none());
        assert!(result.find_action("action-1").is_some());
    }

    #[test]
    fn test_deserialize_tolerates_loose_types() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{
                "total_amount": "$98.40",
                "usage_kwh": null,
                "previous_usage_kwh": "N/A",
                "breakdown_json": {"Delivery": "40", "Taxes": "N/A"},
                "tips_json": null,
                "action_plan": [{"id": "a1", "savings": 12.5}, "garbage"]
            }"#,
        )
        .unwrap();
        assert_eq!(result.total_amount, 98.4);
        assert_eq!(result.usage_kwh, 0.0);
        assert_eq!(result.previous_usage_kwh, None);
        assert_eq!(result.breakdown_json.get("Delivery"), Some(&40.0));
        assert!(!result.breakdown_json.contains_key("Taxes"));
        assert!(result.tips_json.is_empty());
        assert_eq!(result.action_plan.len(), 1);
        assert_eq!(result.action_plan[0].savings, "12.5");
    }

    #[test]
    fn test_empty_document() {
        let result: AnalysisResult = serde_json::from_str("{}").unwrap();
        assert_eq!(result, AnalysisResult::default());
    }

    #[test]
    fn test_summary() {
        let summary = sample().summary(&SplitParams::default());
        assert_eq!(summary.daily_avg_kwh, 15.0);
        assert_eq!(summary.usage_delta_kwh, 55.0);
        let prev = summary.estimated_previous_bill.unwrap();
        assert!((prev - 112.0).abs() < 1e-9);
        assert!((summary.bill_delta.unwrap() - 30.5).abs() < 1e-9);
        assert_eq!(summary.next_month_forecast, 150.0);
        assert_eq!(summary.breakdown[0].category, "Generation");
        assert!((summary.breakdown[1].percent - 50.0 / 142.5 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_without_previous_or_forecast() {
        let result = AnalysisResult {
            total_amount: 100.0,
            usage_kwh: 0.0,
            previous_usage_kwh: Some(0.0),
            ..Default::default()
        };
        let summary = result.summary(&SplitParams::default());
        assert_eq!(summary.daily_avg_kwh, 0.0);
        assert!(summary.estimated_previous_bill.is_none());
        assert!(summary.bill_delta.is_none());
        assert!((summary.next_month_forecast - 112.0).abs() < 1e-9);
        assert!(summary.breakdown.is_empty());
    }
}
