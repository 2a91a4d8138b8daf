//! Per-request admission: decide whether a request creates a session,
//! resumes one, or is rejected, before any payload reaches a transport.
//!
//! Rules, first match wins:
//!
//! 1. no session id, not `initialize`: `InvalidRequest` (no store lookup)
//! 2. session id without a stored record: `SessionNotFound`
//! 3. no session id, `initialize`: create a session
//! 4. session id with a stored record: resume it
//!
//! [`resolve`] then turns the decision into a transport.  A resumed session
//! whose transport is not registered here is handled per
//! [`StaleTransportPolicy`].  Under `Reattach` the record is checked again
//! after the new handle is registered, so a session destroyed between
//! [`admit`] and [`resolve`] is still rejected.

use std::sync::Arc;

use mg_domain::config::StaleTransportPolicy;
use mg_domain::trace::TraceEvent;

use crate::error::SessionError;
use crate::manager::SessionManager;
use crate::transport::{HandlerFactory, StreamableTransport};

/// An admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Initialization without a session id: build a new session.
    Create,
    /// The id has a durable record.
    Resume { session_id: String },
}

/// Classify a request.  An empty header value counts as absent.
pub async fn admit(
    manager: &SessionManager,
    session_id: Option<&str>,
    is_initialize: bool,
) -> Result<Admission, SessionError> {
    let session_id = session_id.filter(|id| !id.is_empty());

    let Some(id) = session_id else {
        if is_initialize {
            return Ok(Admission::Create);
        }
        return Err(rejected(None, SessionError::InvalidRequest));
    };

    if manager.get_session(id).await?.is_none() {
        // The record expired or was removed elsewhere; a handle still
        // registered here must not outlive it.
        if manager.get_transport(id).is_some() {
            manager.destroy_session(id).await?;
        }
        return Err(rejected(Some(id), SessionError::SessionNotFound));
    }

    Ok(Admission::Resume {
        session_id: id.to_owned(),
    })
}

/// Produce the transport that will carry an admitted request.
pub async fn resolve(
    manager: &SessionManager,
    admission: Admission,
    handlers: &HandlerFactory,
) -> Result<Arc<StreamableTransport>, SessionError> {
    let session_id = match admission {
        Admission::Create => {
            let transport = manager.create_transport();
            transport.connect(handlers());
            return Ok(transport);
        }
        Admission::Resume { session_id } => session_id,
    };

    if let Some(transport) = manager.get_transport(&session_id) {
        return Ok(transport);
    }

    match manager.stale_transport_policy() {
        StaleTransportPolicy::Invalidate => {
            manager.destroy_session(&session_id).await?;
            tracing::info!(session_id = %session_id, "purged session without local transport");
            TraceEvent::StaleSessionPurged {
                session_id: session_id.clone(),
            }
            .emit();
            Err(rejected(Some(&session_id), SessionError::SessionNotFound))
        }
        StaleTransportPolicy::Reattach => {
            match manager.attach_transport(&session_id, handlers()).await {
                Err(SessionError::SessionNotFound) => {
                    Err(rejected(Some(&session_id), SessionError::SessionNotFound))
                }
                other => other,
            }
        }
    }
}

fn rejected(session_id: Option<&str>, err: SessionError) -> SessionError {
    tracing::debug!(session_id = ?session_id, code = err.code(), "request rejected");
    TraceEvent::AdmissionRejected {
        session_id: session_id.map(str::to_owned),
        code: err.code(),
    }
    .emit();
    err
}
