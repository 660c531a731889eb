//! Authentication-related handlers

use axum::http::HeaderMap;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use wattguard_core::roster::owner_display_name;

use crate::{get_user_email, AppState};

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// The authenticated user's email or identifier
    pub user: String,
    /// Name shown for the bill owner in a split
    pub display_name: String,
    /// How the user was authenticated
    pub auth_method: String,
}

/// Get the currently authenticated user
pub async fn get_me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<MeResponse> {
    let user = get_user_email(&headers);

    let auth_method = if user == "api-key" {
        "api_key"
    } else if user == "local-dev" {
        if state.config.require_auth {
            "unknown"
        } else {
            "none"
        }
    } else if user.contains('@') {
        "cloudflare_header"
    } else {
        "unknown"
    };

    let email = user.contains('@').then_some(user.as_str());
    Json(MeResponse {
        display_name: owner_display_name(email),
        auth_method: auth_method.to_string(),
        user,
    })
}
