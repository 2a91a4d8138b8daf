use std::sync::Arc;

use mg_domain::config::Config;
use mg_sessions::{HandlerFactory, SessionManager};

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Session and transport lifecycle.
    pub sessions: SessionManager,
    /// Builds the protocol handler bound to each new or reattached transport.
    pub handlers: HandlerFactory,
    /// SHA-256 of the bearer token.  `None` in dev mode (no token configured).
    pub api_token_hash: Option<Vec<u8>>,
}
