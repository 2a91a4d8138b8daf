//! `mg-protocol`: the slice of MCP / JSON-RPC 2.0 framing the gateway needs.
//!
//! Provides message types, the fixed error codes, and the classification
//! helpers the admission logic depends on (most importantly
//! [`is_initialize_request`]).

pub mod codes;
pub mod jsonrpc;
pub mod lifecycle;

pub use jsonrpc::{
    IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
pub use lifecycle::{
    is_initialize_request, Implementation, InitializeParams, InitializeResult,
    LATEST_PROTOCOL_VERSION,
};

/// The only JSON-RPC version accepted on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// HTTP header carrying the session identifier in both directions.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
