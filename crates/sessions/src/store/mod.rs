//! Durable session-existence records.
//!
//! A [`SessionStore`] is the source of truth for whether a session id is
//! valid.  Two backends ship: [`MemorySessionStore`] for single-process use
//! and tests, [`RedisSessionStore`] for deployments where several gateway
//! processes share sessions.

mod memory;
mod redis_store;
pub mod scan;

pub use self::memory::MemorySessionStore;
pub use self::redis_store::{RedisSessionStore, RedisStoreOptions};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The durable record of a session's existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A record stamped with the current time.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Backend contract shared by every session store.
///
/// Implementations must make `save` visible to `load` on every process that
/// shares the backend, and treat deleting an absent id as success.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a record.  Unknown ids yield `Ok(None)`.
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Upsert a record.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Remove a record if present.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;

    /// Every session id currently held by the backend.
    async fn list_all(&self) -> Result<Vec<String>, StoreError>;

    /// Remove every session record held by the backend.
    async fn delete_all(&self) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
