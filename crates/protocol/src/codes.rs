//! Numeric error codes carried in JSON-RPC error objects.

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Server-defined: the transport is closed or not yet initialized.
pub const CONNECTION_CLOSED: i64 = -32000;
/// Server-defined: the referenced session has no durable record.
pub const SESSION_NOT_FOUND: i64 = -32003;
