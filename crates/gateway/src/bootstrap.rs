//! AppState construction and shutdown, shared by `serve` and the tests.

use std::sync::Arc;

use anyhow::Context;

use mg_domain::config::{Config, ConfigSeverity, SessionsConfig, StoreBackend};
use mg_sessions::{
    ManagerOptions, MemorySessionStore, RedisSessionStore, RedisStoreOptions, SessionEvent,
    SessionManager, SessionStore,
};

use crate::api::auth::token_hash_from_env;
use crate::handler::default_handlers;
use crate::state::AppState;

/// Validate config, connect the session store and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Session store ────────────────────────────────────────────────
    let store = build_store(&config.sessions).await?;
    tracing::info!(backend = store.backend(), "session store ready");

    // ── Session manager ──────────────────────────────────────────────
    let options = ManagerOptions::default().with_stale_transport(config.sessions.stale_transport);
    let sessions = SessionManager::new(store, options);
    sessions.events().subscribe(log_session_event);
    tracing::info!(
        stale_transport = ?config.sessions.stale_transport,
        endpoint = %config.server.endpoint,
        "session manager ready"
    );

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = token_hash_from_env(&config.server.api_token_env);

    Ok(AppState {
        config,
        sessions,
        handlers: default_handlers(),
        api_token_hash,
    })
}

/// Open the configured session store backend.
pub async fn build_store(cfg: &SessionsConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match cfg.backend {
        StoreBackend::Memory => Ok(Arc::new(MemorySessionStore::new())),
        StoreBackend::Redis => {
            let store = RedisSessionStore::connect(&cfg.redis_url, RedisStoreOptions::from(cfg))
                .await
                .with_context(|| format!("connecting to redis session store at {}", cfg.redis_url))?;
            Ok(Arc::new(store))
        }
    }
}

/// Tear down every session with a transport in this process.
///
/// Records without a local transport are left alone: on a shared backend
/// they may belong to other gateway processes.
pub async fn shutdown(state: &AppState) {
    let ids = state.sessions.local_session_ids();
    let mut failed = 0usize;
    for id in &ids {
        if let Err(e) = state.sessions.destroy_session(id).await {
            failed += 1;
            tracing::warn!(session_id = %id, error = %e, "failed to destroy session on shutdown");
        }
    }
    tracing::info!(destroyed = ids.len() - failed, failed, "local sessions torn down");
}

fn log_session_event(event: &SessionEvent) {
    match event {
        SessionEvent::Created { session_id } => {
            tracing::debug!(session_id = %session_id, "sessionCreated");
        }
        SessionEvent::Destroyed { session_id } => {
            tracing::debug!(session_id = %session_id, "sessionDestroyed");
        }
        SessionEvent::TransportError { session_id, error } => {
            tracing::debug!(session_id = %session_id, error = %error, "transportError");
        }
    }
}
