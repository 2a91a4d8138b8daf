//! Redis-backed session store.
//!
//! Each session is a hash at `<prefix><session_id>` holding a `createdAt`
//! field (epoch milliseconds).  Every save refreshes the key's TTL so
//! abandoned sessions are reclaimed by Redis itself.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::scan::{escape_glob, KeyScan};
use super::{SessionRecord, SessionStore};
use crate::error::StoreError;

const CREATED_AT_FIELD: &str = "createdAt";

/// Tunables for [`RedisSessionStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreOptions {
    /// Prefix for every session key.
    pub key_prefix: String,
    /// Expiry attached on each save, in seconds.
    pub ttl_secs: u64,
    /// `COUNT` hint per `SCAN` round trip.
    pub scan_batch: usize,
}

impl Default for RedisStoreOptions {
    fn default() -> Self {
        Self {
            key_prefix: "session:".into(),
            ttl_secs: 3600,
            scan_batch: 100,
        }
    }
}

impl From<&mg_domain::config::SessionsConfig> for RedisStoreOptions {
    fn from(cfg: &mg_domain::config::SessionsConfig) -> Self {
        Self {
            key_prefix: cfg.key_prefix.clone(),
            ttl_secs: cfg.ttl_secs,
            scan_batch: cfg.scan_batch,
        }
    }
}

/// Session store shared by every gateway process pointed at the same Redis.
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    options: RedisStoreOptions,
}

impl RedisSessionStore {
    /// Open a multiplexed connection to `redis_url`.
    pub async fn connect(redis_url: &str, options: RedisStoreOptions) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        tracing::info!(
            prefix = %options.key_prefix,
            ttl_secs = options.ttl_secs,
            "redis session store connected"
        );
        Ok(Self::with_connection(conn, options))
    }

    /// Wrap an existing connection.
    pub fn with_connection(conn: MultiplexedConnection, options: RedisStoreOptions) -> Self {
        Self { conn, options }
    }

    fn key(&self, session_id: &str) -> String {
        session_key(&self.options.key_prefix, session_id)
    }

    fn pattern(&self) -> String {
        format!("{}*", escape_glob(&self.options.key_prefix))
    }

    /// Every key under the session prefix, enumerated with `SCAN`.
    async fn session_keys(&self) -> Result<Vec<String>, StoreError> {
        KeyScan::new(self.conn.clone(), self.pattern(), self.options.scan_batch)
            .collect_all()
            .await
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = self.key(session_id);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        parse_record(&key, session_id, &fields).map(Some)
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let key = self.key(&record.session_id);
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .hset(&key, CREATED_AT_FIELD, record.created_at.timestamp_millis())
            .ignore()
            .expire(&key, expire_secs(self.options.ttl_secs))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(session_id)).await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let prefix = &self.options.key_prefix;
        Ok(self
            .session_keys()
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(prefix.as_str()).map(str::to_owned))
            .collect())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let keys = self.session_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        for chunk in keys.chunks(self.options.scan_batch.max(1)) {
            let _: () = conn.del(chunk.to_vec()).await?;
        }
        tracing::info!(deleted = keys.len(), "redis session store cleared");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}{session_id}")
}

/// `EXPIRE` takes a signed count; larger TTLs saturate.
fn expire_secs(ttl_secs: u64) -> i64 {
    i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}

fn parse_record(
    key: &str,
    session_id: &str,
    fields: &HashMap<String, String>,
) -> Result<SessionRecord, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: key.to_owned(),
        reason,
    };
    let raw = fields
        .get(CREATED_AT_FIELD)
        .ok_or_else(|| corrupt(format!("missing {CREATED_AT_FIELD}")))?;
    let millis: i64 = raw
        .parse()
        .map_err(|_| corrupt(format!("{CREATED_AT_FIELD} is not an integer: {raw}")))?;
    let created_at = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| corrupt(format!("{CREATED_AT_FIELD} out of range: {millis}")))?;
    Ok(SessionRecord {
        session_id: session_id.to_owned(),
        created_at,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
