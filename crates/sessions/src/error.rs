//! Error taxonomy for session admission and storage.

use mg_protocol::{codes, JsonRpcError};

/// Failures raised by a [`SessionStore`](crate::store::SessionStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt session record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Outcome of a rejected admission, plus the backend failures that can
/// interrupt one.
///
/// Only [`InvalidRequest`](Self::InvalidRequest) and
/// [`SessionNotFound`](Self::SessionNotFound) are protocol-level rejections;
/// `Store` carries infrastructure failures through to the generic handler.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A non-initialization request arrived without a session id.
    #[error("Invalid request method for existing session")]
    InvalidRequest,

    /// The session id has no durable record (or just lost it).  Clients
    /// must re-initialize.
    #[error("Session not found")]
    SessionNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// The fixed JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidRequest => codes::INVALID_REQUEST,
            Self::SessionNotFound => codes::SESSION_NOT_FOUND,
            Self::Store(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Whether the client caused this error (as opposed to the backend).
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Store(_))
    }

    /// Render as a JSON-RPC error object.  Backend details stay in the logs.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self {
            Self::Store(_) => JsonRpcError::new(self.code(), "Internal error"),
            other => JsonRpcError::new(other.code(), other.to_string()),
        }
    }
}
