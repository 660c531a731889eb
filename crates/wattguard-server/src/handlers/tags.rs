//! Tag catalog handler

use axum::{extract::State, Json};
use std::sync::Arc;

use wattguard_core::weights::CatalogEntry;
use wattguard_core::WeightTable;

use crate::AppState;

/// List the predefined usage tags with their weights
pub async fn list_tags(State(state): State<Arc<AppState>>) -> Json<Vec<CatalogEntry>> {
    let table = WeightTable::from_config(&state.split_config);
    Json(table.catalog_entries())
}
