//! JSON-RPC 2.0 Message Types
//!
//! MCP uses JSON-RPC 2.0 as its transport protocol. This module implements
//! the server side of it: incoming requests and notifications, outgoing
//! responses and errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// Incoming JSON-RPC 2.0 Request or Notification
///
/// A request carries an `id` that must be echoed in the response; a
/// notification has none and expects no response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, expected to be "2.0"
    pub jsonrpc: String,

    /// Request identifier, absent for notifications
    #[serde(default)]
    pub id: Option<RequestId>,

    /// Method name to invoke
    pub method: String,

    /// Optional parameters for the method
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Check if this message is a notification
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
///
/// A response contains either a result or an error, never both.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always "2.0"
    pub jsonrpc: &'static str,

    /// Request ID this is responding to; `null` when it couldn't be determined
    pub id: Option<RequestId>,

    /// Successful result (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error result (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this response is an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to a single line of JSON
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"failed to serialize response: {}"}}}}"#,
                error_codes::INTERNAL_ERROR,
                e
            )
        })
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for protocol errors, positive for application errors)
    pub code: i64,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(error_codes::PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(
            error_codes::INVALID_REQUEST,
            format!("Invalid request: {}", detail),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    /// Parse error - Invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;

    /// Invalid Request - The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i64 = -32600;

    /// Method not found
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Invalid params
    pub const INVALID_PARAMS: i64 = -32602;

    /// Internal error
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Request ID - can be a string or number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Numeric ID
    Number(i64),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// What a single line of input turned out to be
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response
    Request(JsonRpcRequest),
    /// A notification (no id, no response)
    Notification(JsonRpcRequest),
    /// A response from the client; this server never sends requests, so these are ignored
    Response,
    /// Unusable input, answered with this error response
    Invalid(JsonRpcResponse),
}

impl IncomingMessage {
    /// Classify one raw JSON-RPC message.
    pub fn parse(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                return IncomingMessage::Invalid(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::parse_error(e),
                ))
            }
        };

        let has_method = value.get("method").is_some();
        if !has_method && (value.get("result").is_some() || value.get("error").is_some()) {
            return IncomingMessage::Response;
        }

        // Echo whatever id we can recover, even if the rest is malformed
        let id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) if request.jsonrpc != JSONRPC_VERSION => IncomingMessage::Invalid(
                JsonRpcResponse::failure(
                    request.id,
                    JsonRpcError::invalid_request(format!(
                        "unsupported jsonrpc version {:?}",
                        request.jsonrpc
                    )),
                ),
            ),
            Ok(request) if request.is_notification() => IncomingMessage::Notification(request),
            Ok(request) => IncomingMessage::Request(request),
            Err(e) => {
                IncomingMessage::Invalid(JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)))
            }
        }
    }
}
