//! Interactive split sessions
//!
//! A session holds a roster, its custom tags and the latest split, so a
//! client can edit participants one step at a time. Sessions live in memory,
//! belong to the user who created them and expire after 30 minutes idle.

use axum::http::HeaderMap;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use wattguard_core::weights::CatalogEntry;
use wattguard_core::{calculation_details, Participant, SplitResult, SplitSession};

use super::history::load_owned_detail;
use crate::{get_user_email, AppError, AppState, SuccessResponse};

/// Idle time after which a session is dropped
const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct StoredSession {
    owner: String,
    session: SplitSession,
    last_activity: Instant,
}

impl StoredSession {
    fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > SESSION_TIMEOUT
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct SplitSessionManager {
    sessions: RwLock<HashMap<String, StoredSession>>,
    counter: AtomicU64,
}

impl SplitSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let count = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        hasher.update(count.to_le_bytes());
        format!("split_{:x}", hasher.finalize())[..22].to_string()
    }

    /// Store a session and return its id
    pub async fn create(&self, owner: &str, session: SplitSession) -> String {
        let id = self.next_id();
        let mut sessions = self.sessions.write().await;

        // Drop idle sessions while holding the lock anyway
        sessions.retain(|_, s| !s.is_expired());

        sessions.insert(
            id.clone(),
            StoredSession {
                owner: owner.to_string(),
                session,
                last_activity: Instant::now(),
            },
        );
        tracing::debug!(session = %id, owner = %owner, "Created split session");
        id
    }

    /// Run `f` against a live session owned by `owner`.
    ///
    /// Returns None when the session is unknown, expired or owned by
    /// someone else.
    pub async fn with_session<R>(
        &self,
        id: &str,
        owner: &str,
        f: impl FnOnce(&mut SplitSession) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.write().await;

        if sessions.get(id).is_some_and(StoredSession::is_expired) {
            sessions.remove(id);
            return None;
        }

        let stored = sessions.get_mut(id).filter(|s| s.owner == owner)?;
        stored.touch();
        Some(f(&mut stored.session))
    }

    pub async fn delete(&self, id: &str, owner: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(stored) if stored.owner == owner => sessions.remove(id).is_some(),
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Full state of a session as returned by every session endpoint
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub total_amount: f64,
    pub selected_id: Option<String>,
    pub participants: Vec<Participant>,
    pub catalog: Vec<CatalogEntry>,
    pub result: Option<SplitResult>,
}

impl SessionView {
    fn new(id: &str, session: &SplitSession) -> Self {
        Self {
            id: id.to_string(),
            total_amount: session.total(),
            selected_id: session.roster().selected_id().map(str::to_string),
            participants: session.roster().participants().to_vec(),
            catalog: session.weights().catalog_entries(),
            result: session.result().cloned(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub total_amount: Option<f64>,
    /// Take the total from a stored analysis instead
    pub history_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTotalRequest {
    pub total_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomTagRequest {
    pub tag: String,
    /// Defaults to the selected participant
    pub participant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub participant_id: String,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub text: String,
    pub details: String,
}

fn session_not_found() -> AppError {
    AppError::not_found("Split session not found")
}

/// Run `f` against a session and return its resulting state
async fn session_view<F>(
    state: &AppState,
    id: &str,
    user: &str,
    f: F,
) -> Result<Json<SessionView>, AppError>
where
    F: FnOnce(&mut SplitSession) -> Result<(), AppError>,
{
    state
        .sessions
        .with_session(id, user, |session| {
            f(session)?;
            Ok(SessionView::new(id, session))
        })
        .await
        .unwrap_or_else(|| Err(session_not_found()))
        .map(Json)
}

pub async fn create_split_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);

    let total = match (req.history_id, req.total_amount) {
        (Some(history_id), _) => load_owned_detail(&state, history_id, &user)?.result.total_amount,
        (None, Some(total)) => total,
        (None, None) => {
            return Err(AppError::bad_request("Provide either total_amount or history_id"));
        }
    };

    let owner_email = user.contains('@').then_some(user.as_str());
    let session =
        SplitSession::new(total, owner_email, &state.split_config).map_err(AppError::from_core)?;
    let view_session = session.clone();
    let id = state.sessions.create(&user, session).await;

    Ok(Json(SessionView::new(&id, &view_session)))
}

pub async fn get_split_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    session_view(&state, &id, &user, |_| Ok(())).await
}

pub async fn delete_split_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = get_user_email(&headers);
    if !state.sessions.delete(&id, &user).await {
        return Err(session_not_found());
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// Change the bill total and re-split
pub async fn update_split_total(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateTotalRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    session_view(&state, &id, &user, |session| {
        session
            .set_total(req.total_amount)
            .map_err(AppError::from_core)
    })
    .await
}

pub async fn add_session_participant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AddParticipantRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    session_view(&state, &id, &user, |session| {
        session
            .add_participant(&req.name)
            .map(|_| ())
            .ok_or_else(|| AppError::bad_request("Participant name cannot be empty"))
    })
    .await
}

pub async fn remove_session_participant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, participant_id)): Path<(String, String)>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    session_view(&state, &id, &user, |session| {
        if session.roster().get(&participant_id).is_none() {
            return Err(AppError::not_found("Participant not found"));
        }
        if !session.remove_participant(&participant_id) {
            return Err(AppError::bad_request("At least one participant must remain"));
        }
        Ok(())
    })
    .await
}

/// Flip a tag on one participant
pub async fn toggle_participant_tag(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, participant_id)): Path<(String, String)>,
    Json(req): Json<TagRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    let tag = req.tag.trim();
    if tag.is_empty() {
        return Err(AppError::bad_request("Tag cannot be empty"));
    }

    session_view(&state, &id, &user, |session| {
        session
            .toggle_tag(Some(&participant_id), tag)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Participant not found"))
    })
    .await
}

/// Register a custom tag and give it to a participant
pub async fn add_session_custom_tag(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CustomTagRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    if req.tag.trim().is_empty() {
        return Err(AppError::bad_request("Tag cannot be empty"));
    }

    session_view(&state, &id, &user, |session| {
        session
            .add_custom_tag(req.participant_id.as_deref(), &req.tag)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Participant not found"))
    })
    .await
}

pub async fn select_session_participant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<SessionView>, AppError> {
    let user = get_user_email(&headers);
    session_view(&state, &id, &user, |session| {
        if session.select(&req.participant_id) {
            Ok(())
        } else {
            Err(AppError::not_found("Participant not found"))
        }
    })
    .await
}

/// Plain-text summary of the current split, ready to paste into a chat
pub async fn get_session_share(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, AppError> {
    let user = get_user_email(&headers);
    state
        .sessions
        .with_session(&id, &user, |session| {
            let result = session
                .result()
                .ok_or_else(|| AppError::bad_request("Nothing to share yet"))?;
            Ok(ShareResponse {
                text: wattguard_core::share_text(result),
                details: calculation_details(result),
            })
        })
        .await
        .unwrap_or_else(|| Err(session_not_found()))
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattguard_core::SplitConfig;

    fn session(total: f64) -> SplitSession {
        SplitSession::new(total, Some("dana@example.com"), &SplitConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sessions_are_scoped_to_owner() {
        let manager = SplitSessionManager::new();
        let id = manager.create("dana@example.com", session(300.0)).await;

        let total = manager
            .with_session(&id, "dana@example.com", |s| s.total())
            .await;
        assert_eq!(total, Some(300.0));

        let other = manager.with_session(&id, "sam@example.com", |s| s.total()).await;
        assert_eq!(other, None);
        assert!(!manager.delete(&id, "sam@example.com").await);
        assert!(manager.delete(&id, "dana@example.com").await);
        assert_eq!(manager.len().await, 0);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let manager = SplitSessionManager::new();
        let a = manager.create("u", session(10.0)).await;
        let b = manager.create("u", session(10.0)).await;
        assert_ne!(a, b);
        assert!(a.starts_with("split_"));
        assert_eq!(manager.len().await, 2);
    }

    #[tokio::test]
    async fn test_mutations_persist_between_calls() {
        let manager = SplitSessionManager::new();
        let id = manager.create("u", session(300.0)).await;

        manager
            .with_session(&id, "u", |s| s.toggle_tag(Some("1"), "Gaming PC"))
            .await;
        let share = manager
            .with_session(&id, "u", |s| s.result().map(|r| r.participants[0].share))
            .await
            .flatten()
            .unwrap();
        assert!((share - 169.565_217).abs() < 1e-4);
    }
}
