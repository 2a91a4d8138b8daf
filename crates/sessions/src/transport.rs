//! Process-local transport handles.
//!
//! A [`StreamableTransport`] carries JSON-RPC messages for exactly one
//! session.  It owns the initialization handshake: the first successful
//! `initialize` request flips it to initialized and fires
//! [`TransportObserver::on_initialized`] before the reply leaves, so a
//! client never sees its session id before the record is durable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mg_protocol::{
    codes, is_initialize_request, IncomingMessage, JsonRpcError, JsonRpcResponse, RequestId,
};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborator traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Application-level method dispatch bound to one transport.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle_request(&self, method: &str, params: Option<Value>)
        -> Result<Value, JsonRpcError>;

    async fn handle_notification(&self, _method: &str, _params: Option<Value>) {}
}

/// Builds a fresh [`RpcHandler`] for every new or reattached transport.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn RpcHandler> + Send + Sync>;

/// Lifecycle callbacks a transport fires into its owner.
#[async_trait]
pub trait TransportObserver: Send + Sync {
    /// The handshake succeeded.  An error here fails the `initialize`
    /// request and leaves the transport uninitialized.
    async fn on_initialized(&self, session_id: &str) -> Result<(), StoreError>;

    /// The transport was closed by its peer or the gateway.  Fires once.
    async fn on_close(&self, session_id: &str);

    /// A non-fatal transport failure.
    fn on_error(&self, session_id: &str, error: &TransportError);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors and replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport has no protocol handler connected")]
    NotConnected,

    #[error("malformed message: {0}")]
    Malformed(JsonRpcError),

    #[error("session initialization failed: {0}")]
    Initialization(#[source] StoreError),
}

/// What the transport produced for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportReply {
    /// A request was answered (successfully or with a JSON-RPC error).
    Response(JsonRpcResponse),
    /// A notification or client response was accepted; nothing to return.
    Accepted,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StreamableTransport {
    session_id: String,
    initialized: AtomicBool,
    closed: AtomicBool,
    handler: RwLock<Option<Arc<dyn RpcHandler>>>,
    observer: Arc<dyn TransportObserver>,
}

impl std::fmt::Debug for StreamableTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableTransport")
            .field("session_id", &self.session_id)
            .field("initialized", &self.is_initialized())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StreamableTransport {
    /// A transport awaiting its `initialize` request.
    pub fn new(session_id: impl Into<String>, observer: Arc<dyn TransportObserver>) -> Self {
        Self {
            session_id: session_id.into(),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            handler: RwLock::new(None),
            observer,
        }
    }

    /// A transport bound to a session that already completed its handshake
    /// elsewhere.  `on_initialized` never fires for it.
    pub fn resumed(session_id: impl Into<String>, observer: Arc<dyn TransportObserver>) -> Self {
        let transport = Self::new(session_id, observer);
        transport.initialized.store(true, Ordering::SeqCst);
        transport
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Bind the protocol handler that will answer requests.
    pub fn connect(&self, handler: Arc<dyn RpcHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Process one inbound JSON-RPC message.
    pub async fn handle_message(&self, payload: Value) -> Result<TransportReply, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let handler = self
            .handler
            .read()
            .clone()
            .ok_or(TransportError::NotConnected)?;

        let initialize = is_initialize_request(&payload);
        let message = match IncomingMessage::parse(payload) {
            Ok(m) => m,
            Err(e) => {
                let err = TransportError::Malformed(e);
                self.report_error(&err);
                return Err(err);
            }
        };

        match message {
            IncomingMessage::Request(req) if initialize => {
                self.initialize(handler.as_ref(), req.id, req.params).await
            }
            IncomingMessage::Request(req) => {
                if !self.is_initialized() {
                    return Ok(TransportReply::Response(JsonRpcResponse::failure(
                        Some(req.id),
                        JsonRpcError::new(
                            codes::CONNECTION_CLOSED,
                            "Bad Request: Server not initialized",
                        ),
                    )));
                }
                let reply = match handler.handle_request(&req.method, req.params).await {
                    Ok(result) => JsonRpcResponse::success(req.id, result),
                    Err(e) => JsonRpcResponse::failure(Some(req.id), e),
                };
                Ok(TransportReply::Response(reply))
            }
            IncomingMessage::Notification(n) => {
                handler.handle_notification(&n.method, n.params).await;
                Ok(TransportReply::Accepted)
            }
            IncomingMessage::Response(_) => Ok(TransportReply::Accepted),
        }
    }

    async fn initialize(
        &self,
        handler: &dyn RpcHandler,
        id: RequestId,
        params: Option<Value>,
    ) -> Result<TransportReply, TransportError> {
        // Claim the handshake so a concurrent second initialize is refused.
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(TransportReply::Response(JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::new(
                    codes::INVALID_REQUEST,
                    "Invalid Request: Server already initialized",
                ),
            )));
        }

        let result = match handler.handle_request("initialize", params).await {
            Ok(result) => result,
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                return Ok(TransportReply::Response(JsonRpcResponse::failure(Some(id), e)));
            }
        };

        if let Err(e) = self.observer.on_initialized(&self.session_id).await {
            self.initialized.store(false, Ordering::SeqCst);
            let err = TransportError::Initialization(e);
            self.report_error(&err);
            return Err(err);
        }

        Ok(TransportReply::Response(JsonRpcResponse::success(id, result)))
    }

    /// Close the transport and notify the observer.  Later calls are no-ops.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.handler.write().take();
            self.observer.on_close(&self.session_id).await;
        }
    }

    /// Mark closed without firing `on_close`.  Used when the owner is
    /// already tearing the session down.
    pub fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.handler.write().take();
        }
    }

    /// Surface a failure to the observer without closing.
    pub fn report_error(&self, error: &TransportError) {
        self.observer.on_error(&self.session_id, error);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
