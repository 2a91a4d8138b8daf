//! Built-in protocol handler: answers the MCP handshake and `ping`.

use std::sync::Arc;

use async_trait::async_trait;
use mg_protocol::{
    codes, Implementation, InitializeParams, InitializeResult, JsonRpcError,
    LATEST_PROTOCOL_VERSION,
};
use mg_sessions::{HandlerFactory, RpcHandler};
use serde_json::{json, Value};

/// Protocol revisions the gateway can speak.
const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[LATEST_PROTOCOL_VERSION, "2024-11-05"];

pub struct GatewayHandler {
    server_info: Implementation,
}

impl Default for GatewayHandler {
    fn default() -> Self {
        Self {
            server_info: Implementation {
                name: "mcpgate".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }
}

impl GatewayHandler {
    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .ok()
            .flatten()
            .ok_or_else(|| JsonRpcError::new(codes::INVALID_PARAMS, "Invalid initialize params"))?;

        // Echo the client's revision when supported; otherwise offer ours.
        let protocol_version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
            params.protocol_version
        } else {
            LATEST_PROTOCOL_VERSION.to_owned()
        };
        tracing::debug!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version = %protocol_version,
            "initialize"
        );

        let result = InitializeResult {
            protocol_version,
            capabilities: json!({}),
            server_info: self.server_info.clone(),
        };
        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string()))
    }
}

#[async_trait]
impl RpcHandler for GatewayHandler {
    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(json!({})),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    async fn handle_notification(&self, method: &str, _params: Option<Value>) {
        tracing::debug!(method = %method, "notification");
    }
}

/// One [`GatewayHandler`] per transport.
pub fn default_handlers() -> HandlerFactory {
    Arc::new(|| Arc::new(GatewayHandler::default()) as Arc<dyn RpcHandler>)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(version: &str) -> Option<Value> {
        Some(json!({
            "protocolVersion": version,
            "capabilities": {},
            "clientInfo": { "name": "c", "version": "1" }
        }))
    }

    #[tokio::test]
    async fn initialize_echoes_supported_version() {
        let h = GatewayHandler::default();
        let result = h.handle_request("initialize", params("2024-11-05")).await.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "mcpgate");
    }

    #[tokio::test]
    async fn initialize_offers_latest_for_unknown_version() {
        let h = GatewayHandler::default();
        let result = h.handle_request("initialize", params("1999-01-01")).await.unwrap();
        assert_eq!(result["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn initialize_requires_params() {
        let h = GatewayHandler::default();
        let err = h.handle_request("initialize", None).await.unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method() {
        let h = GatewayHandler::default();
        let err = h.handle_request("tools/list", None).await.unwrap_err();
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
    }
}
