//! Mock extractor for testing
//!
//! Returns a fixed, plausible bill analysis without calling any model.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::analysis::{AiInsight, AnalysisResult, MonthlyUsage, RecommendedAction};
use crate::error::{Error, Result};

use super::{BillExtractor, BillImage};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Mock extraction backend
#[derive(Clone)]
pub struct MockExtractor {
    /// Whether health_check should return true
    pub healthy: bool,
    result: AnalysisResult,
}

impl MockExtractor {
    /// Healthy mock returning [`MockExtractor::sample_analysis`]
    pub fn new() -> Self {
        Self {
            healthy: true,
            result: Self::sample_analysis(),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Mock that returns the given analysis for every bill
    pub fn with_result(result: AnalysisResult) -> Self {
        Self {
            healthy: true,
            result,
        }
    }

    pub fn sample_analysis() -> AnalysisResult {
        let usage = [
            520.0, 480.0, 410.0, 350.0, 330.0, 390.0, 470.0, 495.0, 400.0, 360.0, 410.0, 455.0,
        ];
        let temps = [
            -4.0, -2.0, 4.0, 11.0, 17.0, 22.0, 26.0, 25.0, 20.0, 13.0, 6.0, -1.0,
        ];

        let breakdown = BTreeMap::from([
            ("Delivery".to_string(), 48.2),
            ("Generation".to_string(), 81.3),
            ("Taxes & Fees".to_string(), 13.0),
        ]);

        AnalysisResult {
            total_amount: 142.5,
            usage_kwh: 455.0,
            previous_usage_kwh: Some(410.0),
            breakdown_json: breakdown,
            tips_json: vec![
                "Run the dishwasher and laundry after 9pm".to_string(),
                "Set the thermostat 2°C lower overnight".to_string(),
                "Unplug idle chargers and consoles".to_string(),
            ],
            billing_date: Some("2026-12-01".to_string()),
            next_month_forecast: Some(151.2),
            monthly_usage: MONTHS
                .iter()
                .zip(usage.iter().zip(temps.iter()))
                .map(|(month, (usage, temp))| MonthlyUsage {
                    month: (*month).to_string(),
                    usage: *usage,
                    temp: *temp,
                })
                .collect(),
            ai_analysis: vec![
                AiInsight {
                    icon: "dollar".to_string(),
                    title: "Generation dominates".to_string(),
                    description: "Generation is $81.30, 57% of the $142.50 total.".to_string(),
                },
                AiInsight {
                    icon: "zap".to_string(),
                    title: "Usage up 11%".to_string(),
                    description: "455 kWh this month versus 410 kWh last month.".to_string(),
                },
            ],
            action_plan: vec![
                RecommendedAction {
                    id: "action-1".to_string(),
                    icon: "thermometer".to_string(),
                    title: "Lower heating setpoint".to_string(),
                    description: Some(
                        "Heating drives the winter spike; 2°C lower saves ~8% of $81.30 generation."
                            .to_string(),
                    ),
                    savings: "$21.50".to_string(),
                },
                RecommendedAction {
                    id: "action-2".to_string(),
                    icon: "clock".to_string(),
                    title: "Shift laundry off-peak".to_string(),
                    description: None,
                    savings: "$8.00".to_string(),
                },
                RecommendedAction {
                    id: "action-3".to_string(),
                    icon: "zap".to_string(),
                    title: "Kill standby loads".to_string(),
                    description: Some("About 30 kWh of the 455 kWh is standby draw.".to_string()),
                    savings: "$12.75".to_string(),
                },
            ],
        }
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BillExtractor for MockExtractor {
    async fn analyze_bill(&self, images: &[BillImage]) -> Result<AnalysisResult> {
        if images.is_empty() {
            return Err(Error::InvalidData("No bill images provided".into()));
        }
        if !self.healthy {
            return Err(Error::Extraction("Mock extractor is unavailable".into()));
        }
        Ok(self.result.clone())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> BillImage {
        BillImage::new(b"%PDF-1.4".to_vec(), None, None).unwrap()
    }

    #[tokio::test]
    async fn test_sample_analysis() {
        let result = MockExtractor::new().analyze_bill(&[page()]).await.unwrap();
        assert_eq!(result.monthly_usage.len(), 12);
        assert_eq!(result.action_plan.len(), 3);
        let itemized: f64 = result.breakdown_json.values().sum();
        assert!((itemized - result.total_amount).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unhealthy_mock_fails() {
        let mock = MockExtractor::unhealthy();
        assert!(!mock.health_check().await);
        assert!(matches!(
            mock.analyze_bill(&[page()]).await,
            Err(Error::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn test_with_result() {
        let custom = AnalysisResult {
            total_amount: 12.0,
            ..Default::default()
        };
        let result = MockExtractor::with_result(custom.clone())
            .analyze_bill(&[page()])
            .await
            .unwrap();
        assert_eq!(result, custom);
    }
}
