//! The MCP streamable-HTTP endpoint.
//!
//! Every request runs admission before its payload reaches a transport:
//!
//! - `POST`: one JSON-RPC message.  Requests are answered with a JSON
//!   body; notifications and client responses with `202 Accepted`.
//! - `DELETE`: closes the session named by the `mcp-session-id` header.
//!
//! Rejections use the JSON-RPC error shape with `"id": null`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use mg_protocol::{codes, is_initialize_request, JsonRpcError, JsonRpcResponse, SESSION_ID_HEADER};
use mg_sessions::{admit, resolve, SessionError, StreamableTransport, TransportError, TransportReply};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC error rendered with an HTTP status.
#[derive(Debug)]
pub struct McpError {
    status: StatusCode,
    error: JsonRpcError,
}

impl McpError {
    fn new(status: StatusCode, code: i64, message: &str) -> Self {
        Self {
            status,
            error: JsonRpcError::new(code, message),
        }
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL_ERROR, "Internal error")
    }
}

impl From<SessionError> for McpError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::InvalidRequest => StatusCode::BAD_REQUEST,
            SessionError::SessionNotFound => StatusCode::NOT_FOUND,
            SessionError::Store(e) => {
                tracing::error!(error = %e, "session store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            error: err.to_rpc_error(),
        }
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        match err {
            // Closed between resolution and dispatch: the session is gone.
            TransportError::Closed => SessionError::SessionNotFound.into(),
            TransportError::Malformed(error) => Self {
                status: StatusCode::BAD_REQUEST,
                error,
            },
            other => {
                tracing::error!(error = %other, "transport failure");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for McpError {
    fn into_response(self) -> Response {
        (self.status, Json(JsonRpcResponse::failure(None, self.error))).into_response()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `POST {endpoint}`
pub async fn handle_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, McpError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "unparsable request body");
        McpError::new(StatusCode::BAD_REQUEST, codes::PARSE_ERROR, "Parse error")
    })?;

    let session_id = session_header(&headers);
    let admission = admit(
        &state.sessions,
        session_id.as_deref(),
        is_initialize_request(&payload),
    )
    .await?;
    let transport = resolve(&state.sessions, admission, &state.handlers).await?;

    let reply = transport.handle_message(payload).await?;
    let response = match reply {
        TransportReply::Response(body) => Json(body).into_response(),
        TransportReply::Accepted => StatusCode::ACCEPTED.into_response(),
    };
    Ok(with_session_header(response, &transport))
}

/// `DELETE {endpoint}`
pub async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, McpError> {
    let session_id = session_header(&headers);
    let admission = admit(&state.sessions, session_id.as_deref(), false).await?;
    let transport = resolve(&state.sessions, admission, &state.handlers).await?;

    transport.close().await;
    tracing::info!(session_id = %transport.session_id(), "session closed by client");
    Ok(StatusCode::OK)
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Advertise the session id once the transport has completed its handshake.
fn with_session_header(mut response: Response, transport: &Arc<StreamableTransport>) -> Response {
    if !transport.is_initialized() {
        return response;
    }
    if let Ok(value) = HeaderValue::from_str(transport.session_id()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}
