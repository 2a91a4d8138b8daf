//! In-process registry of live transports, keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::transport::StreamableTransport;

/// Thread-safe map of session id to transport handle.  Never persisted;
/// every process rebuilds its own.
pub struct TransportRegistry {
    transports: RwLock<HashMap<String, Arc<StreamableTransport>>>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            transports: RwLock::new(HashMap::new()),
        }
    }

    /// Register a transport under its session id.  Replaces any existing
    /// handle for the same id; the replaced handle is returned.
    pub fn register(&self, transport: Arc<StreamableTransport>) -> Option<Arc<StreamableTransport>> {
        let id = transport.session_id().to_owned();
        let previous = self.transports.write().insert(id.clone(), transport);
        if previous.is_some() {
            tracing::warn!(session_id = %id, "transport replaced in registry");
        } else {
            tracing::debug!(session_id = %id, "transport registered");
        }
        previous
    }

    /// Insert `transport` unless a handle is already registered for its id.
    ///
    /// Returns the handle that ended up registered and whether it was the
    /// one passed in.  Check and insert happen under one write lock.
    pub fn get_or_insert(
        &self,
        transport: Arc<StreamableTransport>,
    ) -> (Arc<StreamableTransport>, bool) {
        let mut transports = self.transports.write();
        if let Some(existing) = transports.get(transport.session_id()) {
            return (existing.clone(), false);
        }
        transports.insert(transport.session_id().to_owned(), transport.clone());
        tracing::debug!(session_id = %transport.session_id(), "transport registered");
        (transport, true)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<StreamableTransport>> {
        self.transports.read().get(session_id).cloned()
    }

    /// Remove and return the handle for `session_id`.
    pub fn remove(&self, session_id: &str) -> Option<Arc<StreamableTransport>> {
        let removed = self.transports.write().remove(session_id);
        if removed.is_some() {
            tracing::debug!(session_id = %session_id, "transport removed");
        }
        removed
    }

    /// Remove `transport` only if it is the handle registered for its id.
    pub fn remove_handle(&self, transport: &Arc<StreamableTransport>) -> bool {
        let mut transports = self.transports.write();
        match transports.get(transport.session_id()) {
            Some(current) if Arc::ptr_eq(current, transport) => {
                transports.remove(transport.session_id());
                tracing::debug!(session_id = %transport.session_id(), "transport removed");
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.transports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.read().is_empty()
    }

    /// Snapshot of registered session ids.
    pub fn ids(&self) -> Vec<String> {
        self.transports.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::transport::{TransportError, TransportObserver};
    use async_trait::async_trait;

    struct Quiet;

    #[async_trait]
    impl TransportObserver for Quiet {
        async fn on_initialized(&self, _session_id: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn on_close(&self, _session_id: &str) {}
        fn on_error(&self, _session_id: &str, _error: &TransportError) {}
    }

    fn handle(id: &str) -> Arc<StreamableTransport> {
        Arc::new(StreamableTransport::new(id, Arc::new(Quiet)))
    }

    #[test]
    fn register_replaces_duplicate() {
        let reg = TransportRegistry::new();
        let first = handle("s1");
        let second = handle("s1");

        assert!(reg.register(first.clone()).is_none());
        let replaced = reg.register(second.clone()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(Arc::ptr_eq(&reg.get("s1").unwrap(), &second));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn get_or_insert_keeps_first() {
        let reg = TransportRegistry::new();
        let first = handle("s1");

        let (won, inserted) = reg.get_or_insert(first.clone());
        assert!(inserted);
        assert!(Arc::ptr_eq(&won, &first));

        let (won, inserted) = reg.get_or_insert(handle("s1"));
        assert!(!inserted);
        assert!(Arc::ptr_eq(&won, &first));
    }

    #[test]
    fn remove_is_idempotent() {
        let reg = TransportRegistry::new();
        reg.register(handle("s1"));
        assert!(reg.remove("s1").is_some());
        assert!(reg.remove("s1").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_handle_ignores_other_handles() {
        let reg = TransportRegistry::new();
        let registered = handle("s1");
        reg.register(registered.clone());

        assert!(!reg.remove_handle(&handle("s1")));
        assert!(reg.get("s1").is_some());
        assert!(reg.remove_handle(&registered));
        assert!(reg.is_empty());
    }

    #[test]
    fn ids_lists_registered_sessions() {
        let reg = TransportRegistry::new();
        reg.register(handle("a"));
        reg.register(handle("b"));
        let mut ids = reg.ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
