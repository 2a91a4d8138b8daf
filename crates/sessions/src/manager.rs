//! Session manager: the only writer of the transport registry and, through
//! the store, of session records.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use mg_domain::config::StaleTransportPolicy;
use mg_domain::trace::TraceEvent;

use crate::error::{SessionError, StoreError};
use crate::events::{EventBus, SessionEvent};
use crate::registry::TransportRegistry;
use crate::store::{SessionRecord, SessionStore};
use crate::transport::{RpcHandler, StreamableTransport, TransportError, TransportObserver};

/// Produces the id for each new session.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Construction-time settings for [`SessionManager`].
#[derive(Clone)]
pub struct ManagerOptions {
    /// Session id source.  Defaults to random v4 UUIDs.
    pub id_generator: IdGenerator,
    /// How admission treats a stored session with no local transport.
    /// Defaults to [`StaleTransportPolicy::Invalidate`].
    pub stale_transport: StaleTransportPolicy,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            id_generator: Arc::new(|| uuid::Uuid::new_v4().to_string()),
            stale_transport: StaleTransportPolicy::default(),
        }
    }
}

impl ManagerOptions {
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    pub fn with_stale_transport(mut self, policy: StaleTransportPolicy) -> Self {
        self.stale_transport = policy;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Inner {
    store: Arc<dyn SessionStore>,
    registry: TransportRegistry,
    events: EventBus,
    options: ManagerOptions,
}

/// Cheap to clone; clones share one registry and store.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, options: ManagerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                registry: TransportRegistry::new(),
                events: EventBus::new(),
                options,
            }),
        }
    }

    /// Build a transport for a brand-new session.
    ///
    /// The handle is not registered yet: once its handshake succeeds the
    /// record is saved, the handle registered, and `Created` published, in
    /// that order.  `get_session` for the new id is absent until then.
    pub fn create_transport(&self) -> Arc<StreamableTransport> {
        let session_id = (self.inner.options.id_generator)();
        tracing::debug!(session_id = %session_id, "creating transport");
        self.new_transport(session_id, false)
    }

    /// Bind a fresh, already-initialized transport to an existing session.
    ///
    /// Concurrent callers for the same id all receive the same handle; only
    /// the first one's `handler` is kept.  The record is checked again once
    /// the handle is registered: if it is gone, the handle is removed and
    /// closed and the caller gets `SessionNotFound`.
    pub async fn attach_transport(
        &self,
        session_id: &str,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<Arc<StreamableTransport>, SessionError> {
        let transport = self.new_transport(session_id.to_owned(), true);
        transport.connect(handler);
        let (transport, inserted) = self.inner.registry.get_or_insert(transport);

        let present = match self.inner.store.load(session_id).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                if inserted {
                    self.discard(&transport);
                }
                return Err(e.into());
            }
        };
        if !present {
            if inserted {
                self.discard(&transport);
            }
            tracing::debug!(session_id = %session_id, "record vanished during reattach");
            return Err(SessionError::SessionNotFound);
        }

        if inserted {
            tracing::info!(session_id = %session_id, "transport reattached");
            TraceEvent::SessionReattached {
                session_id: session_id.to_owned(),
            }
            .emit();
        }
        Ok(transport)
    }

    /// Unregister and close a handle that never became live.  Fires no hooks.
    fn discard(&self, transport: &Arc<StreamableTransport>) {
        self.inner.registry.remove_handle(transport);
        transport.mark_closed();
    }

    fn new_transport(&self, session_id: String, resumed: bool) -> Arc<StreamableTransport> {
        let manager = Arc::downgrade(&self.inner);
        Arc::new_cyclic(|weak| {
            let hooks = Arc::new(SessionHooks {
                manager,
                transport: weak.clone(),
            });
            if resumed {
                StreamableTransport::resumed(session_id, hooks)
            } else {
                StreamableTransport::new(session_id, hooks)
            }
        })
    }

    /// Registry lookup only.
    pub fn get_transport(&self, session_id: &str) -> Option<Arc<StreamableTransport>> {
        self.inner.registry.get(session_id)
    }

    /// Store lookup only.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.store.load(session_id).await
    }

    /// Remove the local transport (if any) and the stored record.
    ///
    /// `Destroyed` is published only when a local transport existed.
    pub async fn destroy_session(&self, session_id: &str) -> Result<(), StoreError> {
        Inner::destroy(&self.inner, session_id).await
    }

    /// Destroy every locally registered session, then clear the store.
    pub async fn destroy_all_sessions(&self) -> Result<(), StoreError> {
        let ids = self.inner.registry.ids();
        try_join_all(ids.iter().map(|id| self.destroy_session(id))).await?;
        self.inner.store.delete_all().await?;
        tracing::info!(local = ids.len(), "all sessions destroyed");
        Ok(())
    }

    /// Transports registered in this process.  Not a store-wide count.
    pub fn sessions_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Ids with a transport registered in this process.
    pub fn local_session_ids(&self) -> Vec<String> {
        self.inner.registry.ids()
    }

    /// Every session id the store holds, across all processes sharing it.
    pub async fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        self.inner.store.list_all().await
    }

    /// Drop the local handle without touching the store or firing hooks.
    /// The session then looks exactly like one owned by another process.
    pub fn evict_transport(&self, session_id: &str) -> bool {
        self.inner.registry.remove(session_id).is_some()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    pub fn stale_transport_policy(&self) -> StaleTransportPolicy {
        self.inner.options.stale_transport
    }
}

impl Inner {
    async fn destroy(&self, session_id: &str) -> Result<(), StoreError> {
        let transport = self.registry.remove(session_id);
        if let Some(t) = &transport {
            t.mark_closed();
        }
        self.store.delete(session_id).await?;

        // A reattach may have registered a handle while the delete was in
        // flight.
        let late = self.registry.remove(session_id);
        if let Some(t) = &late {
            t.mark_closed();
        }
        let had_transport = transport.is_some() || late.is_some();

        TraceEvent::SessionDestroyed {
            session_id: session_id.to_owned(),
            had_transport,
        }
        .emit();
        if had_transport {
            self.events.publish(&SessionEvent::Destroyed {
                session_id: session_id.to_owned(),
            });
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport hooks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-transport observer.  Holds weak references so a transport never
/// keeps the manager alive (or itself).
struct SessionHooks {
    manager: Weak<Inner>,
    transport: Weak<StreamableTransport>,
}

#[async_trait]
impl TransportObserver for SessionHooks {
    async fn on_initialized(&self, session_id: &str) -> Result<(), StoreError> {
        let Some(inner) = self.manager.upgrade() else {
            return Ok(());
        };
        inner.store.save(&SessionRecord::new(session_id)).await?;
        if let Some(transport) = self.transport.upgrade() {
            inner.registry.register(transport);
        }

        tracing::info!(session_id = %session_id, backend = inner.store.backend(), "session created");
        TraceEvent::SessionCreated {
            session_id: session_id.to_owned(),
        }
        .emit();
        inner.events.publish(&SessionEvent::Created {
            session_id: session_id.to_owned(),
        });
        Ok(())
    }

    async fn on_close(&self, session_id: &str) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        if let Err(e) = inner.destroy(session_id).await {
            tracing::warn!(session_id = %session_id, error = %e, "failed to destroy closed session");
        }
    }

    fn on_error(&self, session_id: &str, error: &TransportError) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        tracing::warn!(session_id = %session_id, error = %error, "transport error");
        TraceEvent::TransportError {
            session_id: session_id.to_owned(),
            error: error.to_string(),
        }
        .emit();
        inner.events.publish(&SessionEvent::TransportError {
            session_id: session_id.to_owned(),
            error: error.to_string(),
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use mg_protocol::JsonRpcError;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ok200;

    #[async_trait]
    impl RpcHandler for Ok200 {
        async fn handle_request(&self, _: &str, _: Option<Value>) -> Result<Value, JsonRpcError> {
            Ok(json!({}))
        }
    }

    fn initialize() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0.0.0" }
            }
        })
    }

    fn sequential_ids() -> ManagerOptions {
        let n = Arc::new(AtomicUsize::new(0));
        ManagerOptions::default()
            .with_id_generator(move || format!("sess-{}", n.fetch_add(1, Ordering::SeqCst)))
    }

    fn manager_with(store: Arc<MemorySessionStore>) -> SessionManager {
        SessionManager::new(store, sequential_ids())
    }

    async fn initialized(manager: &SessionManager) -> Arc<StreamableTransport> {
        let t = manager.create_transport();
        t.connect(Arc::new(Ok200));
        t.handle_message(initialize()).await.unwrap();
        t
    }

    #[tokio::test]
    async fn create_defers_record_and_registration_to_handshake() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());

        let t = manager.create_transport();
        assert_eq!(t.session_id(), "sess-0");
        assert!(manager.get_session("sess-0").await.unwrap().is_none());
        assert!(manager.get_transport("sess-0").is_none());

        t.connect(Arc::new(Ok200));
        t.handle_message(initialize()).await.unwrap();
        let record = manager.get_session("sess-0").await.unwrap().unwrap();
        assert!(record.created_at.timestamp_millis() > 0);
        assert!(manager.get_transport("sess-0").is_some());
        assert_eq!(manager.sessions_count(), 1);
    }

    #[tokio::test]
    async fn created_event_follows_durable_save() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s, st) = (seen.clone(), store.clone());
        manager.events().subscribe(move |e| {
            if let SessionEvent::Created { .. } = e {
                s.lock().push(st.len());
            }
        });

        initialized(&manager).await;
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[tokio::test]
    async fn destroy_emits_only_with_local_transport() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let d = destroyed.clone();
        manager.events().subscribe(move |e| {
            if let SessionEvent::Destroyed { .. } = e {
                d.fetch_add(1, Ordering::SeqCst);
            }
        });

        let t = initialized(&manager).await;
        manager.destroy_session(t.session_id()).await.unwrap();
        manager.destroy_session(t.session_id()).await.unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(t.is_closed());

        // Store-only record: removed silently.
        store.save(&SessionRecord::new("orphan")).await.unwrap();
        manager.destroy_session("orphan").await.unwrap();
        assert!(store.is_empty());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_destroys_session() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());

        let t = initialized(&manager).await;
        t.close().await;
        assert_eq!(manager.sessions_count(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_reported_not_fatal() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        manager.events().subscribe(move |ev| {
            if let SessionEvent::TransportError { session_id, .. } = ev {
                e.lock().push(session_id.clone());
            }
        });

        let t = initialized(&manager).await;
        assert!(t.handle_message(json!("not an object")).await.is_err());
        assert_eq!(*errors.lock(), vec!["sess-0"]);
        assert!(manager.get_transport("sess-0").is_some());
        assert!(manager.get_session("sess-0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn count_is_local_to_registry() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());

        initialized(&manager).await;
        store.save(&SessionRecord::new("elsewhere")).await.unwrap();
        assert_eq!(manager.sessions_count(), 1);
        assert_eq!(manager.list_sessions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn destroy_all_clears_registry_and_store() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store.clone());

        for _ in 0..3 {
            initialized(&manager).await;
        }
        store.save(&SessionRecord::new("elsewhere")).await.unwrap();

        manager.destroy_all_sessions().await.unwrap();
        assert_eq!(manager.sessions_count(), 0);
        assert!(manager.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attach_shares_one_handle() {
        let store = Arc::new(MemorySessionStore::new());
        store.save(&SessionRecord::new("s")).await.unwrap();
        let manager = manager_with(store);

        let a = manager.attach_transport("s", Arc::new(Ok200)).await.unwrap();
        let b = manager.attach_transport("s", Arc::new(Ok200)).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_initialized());
        assert_eq!(manager.sessions_count(), 1);
    }

    #[tokio::test]
    async fn attach_without_record_leaves_nothing_registered() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(store);

        let err = manager.attach_transport("gone", Arc::new(Ok200)).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound));
        assert!(manager.get_transport("gone").is_none());
        assert_eq!(manager.sessions_count(), 0);
    }

    #[test]
    fn default_generator_yields_uuids() {
        let options = ManagerOptions::default();
        let id = (options.id_generator)();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_ne!(id, (options.id_generator)());
        assert_eq!(options.stale_transport, StaleTransportPolicy::Invalidate);
    }
}
