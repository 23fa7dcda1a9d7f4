//! MCP Error Types

use crate::protocol::messages::JsonRpcError;
use thiserror::Error;

/// MCP Server Error
///
/// Failures of request handling and of the transports. Handler errors are
/// turned into JSON-RPC error responses; transport errors end the serve loop.
#[derive(Debug, Error)]
pub enum McpError {
    /// Method is not part of what this server implements
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Request parameters could not be used
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Tool is not in the current tool table
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level error (bind, connection, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        McpError::Transport(msg.into())
    }

    /// Create an invalid-params error
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        McpError::InvalidParams(msg.into())
    }
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::MethodNotFound(method) => JsonRpcError::method_not_found(&method),
            McpError::InvalidParams(msg) => JsonRpcError::invalid_params(msg),
            e @ McpError::ToolNotFound(_) => JsonRpcError::invalid_params(e.to_string()),
            e => JsonRpcError::internal(e.to_string()),
        }
    }
}

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::error_codes;

    #[test]
    fn test_error_display() {
        let err = McpError::ToolNotFound("devops.nope".to_string());
        assert_eq!(err.to_string(), "Unknown tool: devops.nope");
    }

    #[test]
    fn test_error_codes() {
        let rpc: JsonRpcError = McpError::ToolNotFound("x.y".into()).into();
        assert_eq!(rpc.code, error_codes::INVALID_PARAMS);
        assert_eq!(rpc.message, "Unknown tool: x.y");

        let rpc: JsonRpcError = McpError::MethodNotFound("resources/list".into()).into();
        assert_eq!(rpc.code, error_codes::METHOD_NOT_FOUND);

        let rpc: JsonRpcError = McpError::transport("closed").into();
        assert_eq!(rpc.code, error_codes::INTERNAL_ERROR);
    }
}
