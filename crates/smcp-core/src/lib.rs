//! Core data model and shared primitives for the SMCP plugin bridge.
//! This crate stays free of process and transport concerns so discovery,
//! execution and the protocol layer can all build on the same types.

pub mod error;
pub mod metrics;
pub mod plugin;
pub mod schema;
pub mod tools;

pub use error::{DescribeError, DiscoveryError, ExecutionError, ToolCallError};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use plugin::{
    is_valid_name, CommandHints, CommandSpec, DescribeDocument, DiscoveryMethod, EntryPoint,
    Launcher, ParameterSpec, ParameterType, PluginInfo, PluginRecord, PluginRegistry,
};
pub use schema::{to_json_schema, Properties, ToolParameterSchema};
pub use tools::{qualified_name, ToolAnnotations, ToolDescriptor, ToolOutput};
