//! Stateless savings and forecast calculation

use axum::http::HeaderMap;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use wattguard_core::{AnalysisResult, BillSummary, ForecastSummary, SavingsTracker};

use super::history::load_owned_detail;
use crate::{get_user_email, AppError, AppState};

/// Either an inline analysis or a stored one by id
#[derive(Debug, Deserialize)]
pub struct SavingsRequest {
    pub analysis: Option<AnalysisResult>,
    pub history_id: Option<i64>,
    #[serde(default)]
    pub applied_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SavingsResponse {
    pub forecast: ForecastSummary,
    pub summary: BillSummary,
}

/// Apply recommended actions and return the adjusted forecast
pub async fn compute_savings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SavingsRequest>,
) -> Result<Json<SavingsResponse>, AppError> {
    let analysis = match (req.analysis, req.history_id) {
        (Some(analysis), _) => analysis,
        (None, Some(id)) => {
            let user = get_user_email(&headers);
            load_owned_detail(&state, id, &user)?.result
        }
        (None, None) => {
            return Err(AppError::bad_request("Provide either analysis or history_id"));
        }
    };

    let params = state.split_config.params;
    let mut tracker = SavingsTracker::new(analysis, &params);
    // Listing an id twice must not un-apply it
    let requested: BTreeSet<&str> = req.applied_ids.iter().map(String::as_str).collect();
    for id in requested {
        if tracker.toggle(id).is_none() {
            tracing::debug!(action = %id, "Ignoring unknown action id");
        }
    }

    Ok(Json(SavingsResponse {
        summary: tracker.analysis().summary(&params),
        forecast: tracker.summary().clone(),
    }))
}
