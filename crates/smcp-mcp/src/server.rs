//! MCP request dispatch
//!
//! [`McpServer`] is transport-agnostic: it turns one incoming JSON-RPC
//! message into at most one response. The transports decide how requests
//! are scheduled and how responses travel back.

use crate::protocol::{
    negotiate_protocol_version, CancelledParams, IncomingMessage, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpError, McpResult, McpTool,
    McpToolResult, ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability,
    ToolsListResult,
};
use serde_json::{Map, Value};
use smcp_core::ToolCallError;
use smcp_runtime::PluginHost;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_INSTRUCTIONS: &str =
    "Tools are command-line plugin commands named `plugin.command`. Call `health` for server status.";

/// Server-side MCP endpoint backed by a [`PluginHost`]
#[derive(Debug, Clone)]
pub struct McpServer {
    host: Arc<PluginHost>,
    info: ServerInfo,
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(host: Arc<PluginHost>) -> Self {
        Self {
            host,
            info: ServerInfo::default(),
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
        }
    }

    pub fn with_server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.info = ServerInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    /// Handle one raw message and return the serialized response, if any.
    ///
    /// Notifications and stray client responses produce `None`.
    pub async fn handle_message(&self, raw: &str) -> Option<String> {
        match IncomingMessage::parse(raw) {
            IncomingMessage::Request(request) => Some(self.handle_request(request).await.to_line()),
            IncomingMessage::Notification(notification) => {
                self.handle_notification(&notification);
                None
            }
            IncomingMessage::Response => {
                debug!("Ignoring response message from client");
                None
            }
            IncomingMessage::Invalid(response) => {
                warn!(error = ?response.error, "Rejected malformed message");
                Some(response.to_line())
            }
        }
    }

    /// Dispatch a request and build its response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        debug!(method = %request.method, id = ?id, "Handling request");

        match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                debug!(error = %e, "Request failed");
                JsonRpcResponse::failure(id, JsonRpcError::from(e))
            }
        }
    }

    /// Handle a notification that needs no transport involvement.
    ///
    /// `notifications/cancelled` is acted on by the transports, which own
    /// the in-flight tasks.
    pub fn handle_notification(&self, notification: &JsonRpcRequest) {
        match notification.method.as_str() {
            "notifications/initialized" => info!("Client completed initialization"),
            "notifications/cancelled" => {
                debug!("Cancellation received outside of a transport, nothing to cancel")
            }
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(Value::Object(Map::new())),
            "tools/list" => self.list_tools().await,
            "tools/call" => self.call_tool(params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| McpError::invalid_params(e.to_string()))?,
            None => InitializeParams::default(),
        };

        let version = negotiate_protocol_version(params.protocol_version.as_deref());
        info!(
            client = params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
            protocol_version = version,
            "Client initializing"
        );

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn list_tools(&self) -> McpResult<Value> {
        let tools: Vec<McpTool> = self
            .host
            .list_tools()
            .await
            .iter()
            .map(McpTool::from)
            .collect();
        debug!(count = tools.len(), "Listing tools");
        Ok(serde_json::to_value(ToolsListResult {
            tools,
            next_cursor: None,
        })?)
    }

    async fn call_tool(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ToolCallParams = params
            .ok_or_else(|| McpError::invalid_params("missing params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| McpError::invalid_params(e.to_string()))
            })?;

        let arguments = match params.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(McpError::invalid_params("arguments must be an object")),
        };

        let result = match self.host.call_tool(&params.name, arguments).await {
            Ok(output) => McpToolResult::text(output.text),
            Err(ToolCallError::UnknownTool(name)) => return Err(McpError::ToolNotFound(name)),
            Err(ToolCallError::Execution(e)) => McpToolResult::error(e),
        };
        Ok(serde_json::to_value(result)?)
    }
}

/// Extract the target of a `notifications/cancelled` message.
pub fn cancelled_request(notification: &JsonRpcRequest) -> Option<CancelledParams> {
    if notification.method != "notifications/cancelled" {
        return None;
    }
    let params = notification.params.clone()?;
    match serde_json::from_value(params) {
        Ok(params) => Some(params),
        Err(e) => {
            warn!(error = %e, "Malformed cancellation notification");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{error_codes, RequestId};
    use serde_json::json;
    use smcp_runtime::HostConfig;

    async fn server() -> McpServer {
        let host = Arc::new(PluginHost::new(HostConfig::default()));
        host.install(Default::default()).await;
        McpServer::new(host)
    }

    async fn call(server: &McpServer, message: Value) -> Value {
        let line = server.handle_message(&message.to_string()).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server().await;
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "letta", "version": "1.0"}
            }}),
        )
        .await;

        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(resp["result"]["serverInfo"]["name"], "smcp");
        assert_eq!(resp["result"]["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn test_ping_and_unknown_method() {
        let server = server().await;
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": "p", "method": "ping"})).await;
        assert_eq!(resp["result"], json!({}));

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).await;
        assert_eq!(resp["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let server = server().await;
        let line = server.handle_message("{\"jsonrpc\": ").await.unwrap();
        let resp: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(resp["error"]["code"], error_codes::PARSE_ERROR);
        assert_eq!(resp["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server().await;
        let msg = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(server.handle_message(&msg.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_list_includes_health() {
        let server = server().await;
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"})).await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "health");
        assert_eq!(tools[0]["annotations"]["readOnlyHint"], true);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_invalid_params() {
        let server = server().await;
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "nope.nothing", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], error_codes::INVALID_PARAMS);
        assert_eq!(resp["error"]["message"], "Unknown tool: nope.nothing");
    }

    #[tokio::test]
    async fn test_call_rejects_non_object_arguments() {
        let server = server().await;
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                   "params": {"name": "health", "arguments": [1, 2]}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_call_health() {
        let server = server().await;
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"name": "health"}}),
        )
        .await;
        assert_eq!(resp["result"]["isError"], false);
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        let health: Value = serde_json::from_str(text).unwrap();
        assert_eq!(health["status"], "healthy");
    }

    #[test]
    fn test_cancelled_request() {
        let msg = match IncomingMessage::parse(
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":9}}"#,
        ) {
            IncomingMessage::Notification(n) => n,
            other => panic!("expected notification, got {:?}", other),
        };
        let params = cancelled_request(&msg).unwrap();
        assert_eq!(params.request_id, RequestId::Number(9));
    }
}
