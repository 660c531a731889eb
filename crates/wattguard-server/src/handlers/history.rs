//! Analysis history handlers
//!
//! Records are scoped to the authenticated user. Someone else's record is
//! reported as missing rather than forbidden.

use axum::http::HeaderMap;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use wattguard_core::{BillSummary, HistoryDetail, HistoryItem, MonthlyUsagePoint};

use crate::{get_user_email, AppError, AppState, SuccessResponse};

#[derive(Debug, Serialize)]
pub struct HistoryDetailResponse {
    #[serde(flatten)]
    pub detail: HistoryDetail,
    pub summary: BillSummary,
}

/// Fetch a stored analysis, hiding records that belong to other users
pub(crate) fn load_owned_detail(
    state: &AppState,
    id: i64,
    user: &str,
) -> Result<HistoryDetail, AppError> {
    match state.db.get_history_detail(id).map_err(AppError::from_core)? {
        Some(detail) if detail.user_email == user => Ok(detail),
        _ => Err(AppError::not_found("Analysis not found")),
    }
}

/// List the caller's analyses, newest first
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<HistoryItem>>, AppError> {
    let user = get_user_email(&headers);
    let items = state.db.list_history(&user)?;
    Ok(Json(items))
}

/// Month-by-month usage across the caller's history
pub async fn get_usage_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<MonthlyUsagePoint>>, AppError> {
    let user = get_user_email(&headers);
    let points = state.db.monthly_usage_history(&user)?;
    Ok(Json(points))
}

pub async fn get_history_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<HistoryDetailResponse>, AppError> {
    let user = get_user_email(&headers);
    let detail = load_owned_detail(&state, id, &user)?;
    let summary = detail.result.summary(&state.split_config.params);
    Ok(Json(HistoryDetailResponse { detail, summary }))
}

pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = get_user_email(&headers);
    load_owned_detail(&state, id, &user)?;

    if !state.db.delete_analysis(id)? {
        return Err(AppError::not_found("Analysis not found"));
    }
    tracing::info!(id, user = %user, "Deleted bill analysis");
    Ok(Json(SuccessResponse { success: true }))
}
