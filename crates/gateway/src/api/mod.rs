pub mod auth;
pub mod health;
pub mod mcp;
pub mod stats;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the gateway router.
///
/// `/health` is public.  The MCP endpoint (mounted at
/// `server.endpoint`) and the stats route sit behind the bearer-token
/// middleware.  GET on the MCP endpoint is not served (405).
pub fn router(state: AppState) -> Router<AppState> {
    let endpoint = state.config.server.endpoint.clone();

    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        .route(&endpoint, post(mcp::handle_post).delete(mcp::handle_delete))
        .route("/v1/sessions/stats", get(stats::session_stats))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}
