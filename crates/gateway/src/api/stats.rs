use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct SessionStats {
    /// Transports registered in this process, not a cluster-wide count.
    active_sessions: usize,
    endpoint: String,
    store: &'static str,
}

/// `GET /v1/sessions/stats`
pub async fn session_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(SessionStats {
        active_sessions: state.sessions.sessions_count(),
        endpoint: state.config.server.endpoint.clone(),
        store: state.sessions.store().backend(),
    })
}
