//! WattGuard Web Server
//!
//! Axum-based REST API for bill analysis, savings forecasts and fair splits.
//!
//! Security features:
//! - Cloudflare Access or API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Upload validation (file type and size limits)
//! - Per-user scoping of history and split sessions
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use wattguard_core::db::Database;
use wattguard_core::extract::MAX_BILL_FILE_SIZE;
use wattguard_core::{BillExtractor, ExtractorClient, SplitConfig};

mod handlers;

/// Largest multipart request accepted (a few bill pages)
pub const MAX_UPLOAD_SIZE: usize = 4 * MAX_BILL_FILE_SIZE;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Tag weights and split heuristics
    pub split_config: SplitConfig,
    /// Vision backend, None when not configured
    pub extractor: Option<ExtractorClient>,
    /// Interactive split sessions
    pub sessions: handlers::SplitSessionManager,
}

/// Authentication middleware - accepts a Cloudflare Access user header or a
/// configured API key
///
/// The Cloudflare header is only safe behind Cloudflare Tunnel, which strips
/// and rewrites CF headers. API keys are compared in constant time.
async fn auth_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let cf_user = request
        .headers()
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = cf_user {
        info!(user = %email, path = %request.uri().path(), "Authenticated via Cloudflare Access header");
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Compare an API key against the configured keys in constant time
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Identity of the caller, used to scope history and sessions.
/// Returns the CF Access email, "api-key" for API key auth, or "local-dev"
/// when unauthenticated.
pub fn get_user_email(headers: &axum::http::HeaderMap) -> String {
    if let Some(email) = headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return email.to_string();
    }

    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-dev".to_string()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    split_config: SplitConfig,
) -> Router {
    let extractor = ExtractorClient::from_env();
    match &extractor {
        Some(client) => info!(
            "Vision backend configured: {} (model: {})",
            client.host(),
            client.model()
        ),
        None => info!("Vision backend not configured (set OPENAI_COMPATIBLE_HOST to enable bill analysis)"),
    }
    create_router_with_options(db, static_dir, config, split_config, extractor)
}

/// Create the application router with an explicit extractor (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    split_config: SplitConfig,
    extractor: Option<ExtractorClient>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        split_config,
        extractor,
        sessions: handlers::SplitSessionManager::new(),
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        // Tag catalog
        .route("/tags", get(handlers::list_tags))
        // Stateless engines
        .route("/split", post(handlers::compute_split))
        .route("/savings", post(handlers::compute_savings))
        // Split sessions
        .route("/split/sessions", post(handlers::create_split_session))
        .route(
            "/split/sessions/:id",
            get(handlers::get_split_session)
                .patch(handlers::update_split_total)
                .delete(handlers::delete_split_session),
        )
        .route(
            "/split/sessions/:id/participants",
            post(handlers::add_session_participant),
        )
        .route(
            "/split/sessions/:id/participants/:pid",
            delete(handlers::remove_session_participant),
        )
        .route(
            "/split/sessions/:id/participants/:pid/tags",
            post(handlers::toggle_participant_tag),
        )
        .route("/split/sessions/:id/tags", post(handlers::add_session_custom_tag))
        .route("/split/sessions/:id/select", post(handlers::select_session_participant))
        .route("/split/sessions/:id/share", get(handlers::get_session_share))
        // Bill analysis
        .route(
            "/analyze",
            post(handlers::analyze_bill).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        // History
        .route("/history", get(handlers::list_history))
        .route("/history/usage", get(handlers::get_usage_history))
        .route(
            "/history/:id",
            get(handlers::get_history_detail).delete(handlers::delete_history),
        );

    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Same-origin only
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // Bill previews are rendered from blob: and data: URLs
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
    split_config: SplitConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    }

    check_extractor_connection().await;

    let app = create_router(db, static_dir, config, split_config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log whether the vision backend answers
async fn check_extractor_connection() {
    match ExtractorClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!("Vision backend connected: {} ({})", client.host(), client.model());
            } else {
                warn!(
                    "Vision backend configured but not responding: {} ({})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("Vision backend not configured (set OPENAI_COMPATIBLE_HOST to enable bill analysis)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn unavailable(msg: &str) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    /// Map a core error to a status code. Validation failures are shown to
    /// the client, everything else is logged and hidden.
    pub fn from_core(err: wattguard_core::Error) -> Self {
        use wattguard_core::Error;

        match err {
            Error::InvalidData(msg) => Self::bad_request(&msg),
            Error::EmptyRoster => Self::bad_request("Cannot split a bill across an empty roster"),
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::Extraction(msg) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: "Bill analysis failed".to_string(),
                internal: Some(anyhow::anyhow!(msg)),
            },
            other => Self::from(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            internal: Some(err.into()),
        }
    }
}
