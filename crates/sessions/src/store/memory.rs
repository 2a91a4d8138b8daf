use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{SessionRecord, SessionStore};
use crate::error::StoreError;

/// Process-local session store.  Records live as long as the process.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.sessions
            .write()
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.sessions.read().keys().cloned().collect())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.sessions.write().clear();
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_unknown_is_none() {
        let store = MemorySessionStore::new();
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = MemorySessionStore::new();
        let record = SessionRecord::new("s1");
        store.save(&record).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = MemorySessionStore::new();
        store.save(&SessionRecord::new("s1")).await.unwrap();
        let newer = SessionRecord::new("s1");
        store.save(&newer).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("s1").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new();
        store.save(&SessionRecord::new("s1")).await.unwrap();
        store.delete("s1").await.unwrap();
        store.delete("s1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_and_delete_all() {
        let store = MemorySessionStore::new();
        for id in ["a", "b", "c"] {
            store.save(&SessionRecord::new(id)).await.unwrap();
        }
        let mut ids = store.list_all().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);

        store.delete_all().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
