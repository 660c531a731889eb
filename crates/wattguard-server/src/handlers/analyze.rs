//! Bill upload and analysis

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use wattguard_core::extract::content_hash;
use wattguard_core::{
    AnalysisResult, BillExtractor, BillImage, BillSummary, MonthlyUsagePoint,
};

use crate::{get_user_email, AppError, AppState, MAX_UPLOAD_SIZE};

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    /// Stored history id, None when saving was turned off
    pub id: Option<i64>,
    /// The same bill was analyzed before and the stored result is returned
    pub duplicate: bool,
    pub result: AnalysisResult,
    pub summary: BillSummary,
    pub usage_history: Vec<MonthlyUsagePoint>,
}

/// Analyze an uploaded bill.
///
/// Multipart fields: one or more `file` parts (pages of the same bill) and
/// an optional `save` part (`false` to skip storing the result).
pub async fn analyze_bill(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let user = get_user_email(&headers);
    let mut pages: Vec<BillImage> = Vec::new();
    let mut file_names: Vec<String> = Vec::new();
    let mut save = true;
    let mut total_size: usize = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;
                total_size += bytes.len();

                if total_size > MAX_UPLOAD_SIZE {
                    return Err(AppError::bad_request(&format!(
                        "Upload too large. Maximum size is {} MB",
                        MAX_UPLOAD_SIZE / 1024 / 1024
                    )));
                }

                let page = BillImage::new(
                    bytes.to_vec(),
                    content_type.as_deref(),
                    file_name.as_deref(),
                )
                .map_err(AppError::from_core)?;
                if let Some(file_name) = file_name {
                    file_names.push(file_name);
                }
                pages.push(page);
            }
            "save" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read save flag"))?;
                save = !matches!(value.trim(), "false" | "0" | "no");
            }
            _ => {}
        }
    }

    if pages.is_empty() {
        return Err(AppError::bad_request("No file provided"));
    }

    let params = state.split_config.params;
    let hash = content_hash(&pages);

    if let Some(existing) = state.db.find_by_hash(&user, &hash)? {
        if let Some(detail) = state.db.get_history_detail(existing)? {
            info!(id = existing, user = %user, "Returning stored analysis for re-uploaded bill");
            let usage_history = state.db.usage_chart(&user, &detail.result)?;
            return Ok(Json(AnalyzeResponse {
                id: Some(existing),
                duplicate: true,
                summary: detail.result.summary(&params),
                result: detail.result,
                usage_history,
            }));
        }
    }

    let extractor = state
        .extractor
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Bill analysis is not configured"))?;

    info!(pages = pages.len(), model = extractor.model(), "Analyzing bill");
    let result = extractor
        .analyze_bill(&pages)
        .await
        .map_err(AppError::from_core)?;

    let id = if save {
        let file_url = (!file_names.is_empty()).then(|| file_names.join(", "));
        Some(
            state
                .db
                .save_analysis(&user, file_url.as_deref(), Some(hash.as_str()), &result)?,
        )
    } else {
        None
    };

    let usage_history = state.db.usage_chart(&user, &result)?;
    Ok(Json(AnalyzeResponse {
        id,
        duplicate: false,
        summary: result.summary(&params),
        result,
        usage_history,
    }))
}
