use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store & transport lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session persistence and lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Which store backend holds session records.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL.  Only read when `backend = "redis"`.
    #[serde(default = "d_redis_url")]
    pub redis_url: String,

    /// Prefix prepended to every session key (`<prefix><session_id>`).
    #[serde(default = "d_key_prefix")]
    pub key_prefix: String,

    /// Time-to-live attached to each record by networked backends, in seconds.
    /// Sessions abandoned without an explicit close expire after this.
    #[serde(default = "d_ttl_secs")]
    pub ttl_secs: u64,

    /// `COUNT` hint for each `SCAN` round trip when enumerating sessions.
    #[serde(default = "d_scan_batch")]
    pub scan_batch: usize,

    /// What to do when a session record exists but this process holds no
    /// transport for it.
    #[serde(default)]
    pub stale_transport: StaleTransportPolicy,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: d_redis_url(),
            key_prefix: d_key_prefix(),
            ttl_secs: d_ttl_secs(),
            scan_batch: d_scan_batch(),
            stale_transport: StaleTransportPolicy::Invalidate,
        }
    }
}

/// Session store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map.  Records vanish on restart.
    #[default]
    Memory,
    /// Hash-per-session in Redis with per-key expiry.
    Redis,
}

/// Policy applied when a request references a session whose record exists
/// in the store but whose transport is not registered in this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleTransportPolicy {
    /// Purge the stale record and force the client to re-initialize.
    #[default]
    Invalidate,
    /// Bind a fresh, already-initialized transport to the existing id.
    Reattach,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_redis_url() -> String {
    "redis://127.0.0.1:6379".into()
}
fn d_key_prefix() -> String {
    "session:".into()
}
fn d_ttl_secs() -> u64 {
    3600
}
fn d_scan_batch() -> usize {
    100
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: SessionsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.backend, StoreBackend::Memory);
        assert_eq!(cfg.key_prefix, "session:");
        assert_eq!(cfg.ttl_secs, 3600);
        assert_eq!(cfg.scan_batch, 100);
        assert_eq!(cfg.stale_transport, StaleTransportPolicy::Invalidate);
    }

    #[test]
    fn parses_redis_backend() {
        let toml_str = r#"
            backend = "redis"
            redis_url = "redis://cache:6379/2"
            ttl_secs = 600
            stale_transport = "reattach"
        "#;
        let cfg: SessionsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.backend, StoreBackend::Redis);
        assert_eq!(cfg.redis_url, "redis://cache:6379/2");
        assert_eq!(cfg.ttl_secs, 600);
        assert_eq!(cfg.stale_transport, StaleTransportPolicy::Reattach);
    }

    #[test]
    fn rejects_unknown_backend() {
        let result: Result<SessionsConfig, _> = toml::from_str(r#"backend = "etcd""#);
        assert!(result.is_err());
    }
}
