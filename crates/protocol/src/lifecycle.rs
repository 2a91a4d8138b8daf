//! The MCP initialization handshake.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision this server speaks when the client asks for one it
/// does not know.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

/// Name and version of a client or server implementation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: Implementation,
}

/// Result payload of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: Value,
    pub server_info: Implementation,
}

/// Whether a raw payload is an MCP `initialize` request.
///
/// Requires a JSON-RPC 2.0 object with an `id`, `method == "initialize"` and
/// params that decode as [`InitializeParams`].  Notifications and batches
/// never qualify.
pub fn is_initialize_request(payload: &Value) -> bool {
    let Some(obj) = payload.as_object() else {
        return false;
    };
    if obj.get("jsonrpc").and_then(Value::as_str) != Some(crate::JSONRPC_VERSION) {
        return false;
    }
    if obj.get("method").and_then(Value::as_str) != Some("initialize") {
        return false;
    }
    if obj.get("id").map_or(true, Value::is_null) {
        return false;
    }
    obj.get("params")
        .cloned()
        .is_some_and(|p| serde_json::from_value::<InitializeParams>(p).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn initialize() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "ExampleClient", "version": "1.0.0" }
            }
        })
    }

    #[test]
    fn recognizes_initialize() {
        assert!(is_initialize_request(&initialize()));
    }

    #[test]
    fn ping_is_not_initialize() {
        let ping = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping", "params": {} });
        assert!(!is_initialize_request(&ping));
    }

    #[test]
    fn initialize_without_id_is_not_a_request() {
        let mut msg = initialize();
        msg.as_object_mut().unwrap().remove("id");
        assert!(!is_initialize_request(&msg));
    }

    #[test]
    fn initialize_without_client_info_is_rejected() {
        let msg = json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2025-03-26" }
        });
        assert!(!is_initialize_request(&msg));
    }

    #[test]
    fn batch_is_not_initialize() {
        assert!(!is_initialize_request(&json!([initialize()])));
    }
}
