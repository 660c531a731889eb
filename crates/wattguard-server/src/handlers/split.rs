//! Stateless split calculation

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use wattguard_core::{calculation_details, Roster, SplitResult, SplitSession};

use crate::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct SplitParticipantInput {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    pub total_amount: f64,
    pub participants: Vec<SplitParticipantInput>,
}

#[derive(Debug, Serialize)]
pub struct SplitResponse {
    pub split: SplitResult,
    pub share_text: String,
    pub details: String,
}

/// Split a bill across an ad-hoc roster without creating a session
pub async fn compute_split(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SplitRequest>,
) -> Result<Json<SplitResponse>, AppError> {
    if req.participants.is_empty() {
        return Err(AppError::bad_request("At least one participant is required"));
    }

    let mut roster = Roster::new();
    for input in &req.participants {
        let id = roster
            .add_participant(&input.name)
            .map(|p| p.id.clone())
            .ok_or_else(|| AppError::bad_request("Participant name cannot be empty"))?;
        for tag in input.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            roster.add_tag(&id, tag);
        }
    }

    let session = SplitSession::with_roster(req.total_amount, roster, &state.split_config)
        .map_err(AppError::from_core)?;
    let split = session
        .result()
        .cloned()
        .ok_or_else(|| AppError::internal("Split could not be computed"))?;

    Ok(Json(SplitResponse {
        share_text: wattguard_core::share_text(&split),
        details: calculation_details(&split),
        split,
    }))
}
