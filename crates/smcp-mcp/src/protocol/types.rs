//! MCP Protocol Types
//!
//! The server-side subset of MCP this bridge speaks:
//! - Initialization handshake
//! - Tool listing and tool calls
//! - Cancellation notifications

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smcp_core::{ToolAnnotations, ToolDescriptor};

// ============================================
// MCP Protocol Version
// ============================================

/// Protocol version offered when the client asks for one we don't know
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol versions this server will agree to
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Pick the version to answer `initialize` with.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().copied().find(|s| *s == v))
        .unwrap_or(MCP_PROTOCOL_VERSION)
}

// ============================================
// Initialization Types
// ============================================

/// Parameters of the initialize request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeParams {
    /// Protocol version the client supports
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: Option<String>,

    /// Client capabilities (not interpreted)
    #[serde(default)]
    pub capabilities: Value,

    /// Client information
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<ClientInfo>,
}

/// Information about the MCP client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,
}

/// Result of the initialize request
#[derive(Debug, Clone, Serialize)]
pub struct InitializeResult {
    /// Protocol version the server agreed to
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Server capabilities
    pub capabilities: ServerCapabilities,

    /// Server information
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,

    /// Optional instructions for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Server capabilities advertised during initialization
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tools capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability details
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolsCapability {
    /// Whether the server announces tool list changes
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Information about this MCP server
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,

    /// Server version
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "smcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ============================================
// Tool Types
// ============================================

/// MCP Tool Definition
#[derive(Debug, Clone, Serialize)]
pub struct McpTool {
    /// Unique tool name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    /// Behavior hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl From<&ToolDescriptor> for McpTool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.qualified_name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema.to_value(),
            annotations: Some(descriptor.annotations.clone()),
        }
    }
}

/// Result of listing tools
#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    /// List of available tools
    pub tools: Vec<McpTool>,

    /// Cursor for pagination (never set; the whole list is returned)
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for calling a tool
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Result of calling a tool
#[derive(Debug, Clone, Serialize)]
pub struct McpToolResult {
    /// Content returned by the tool
    pub content: Vec<McpContent>,

    /// Whether this result represents an error
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl McpToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::text(text)],
            is_error: false,
        }
    }

    /// Tool-level failure: still a successful JSON-RPC response
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            content: vec![McpContent::text(format!("Error: {}", message))],
            is_error: true,
        }
    }
}

// ============================================
// Content Types
// ============================================

/// MCP Content
///
/// Plugins only ever produce text.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum McpContent {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// The text content
        text: String,
    },
}

impl McpContent {
    /// Create text content
    pub fn text(content: impl Into<String>) -> Self {
        McpContent::Text {
            text: content.into(),
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            McpContent::Text { text } => text,
        }
    }
}

// ============================================
// Notifications
// ============================================

/// Parameters of `notifications/cancelled`
#[derive(Debug, Clone, Deserialize)]
pub struct CancelledParams {
    #[serde(rename = "requestId")]
    pub request_id: crate::protocol::RequestId,

    #[serde(default)]
    pub reason: Option<String>,
}
