//! Discovery, registration and execution for the SMCP plugin bridge.
//!
//! [`PluginHost`] ties the pieces together: it discovers plugins with
//! [`PluginDiscoverer`], flattens them into a [`ToolTable`] with
//! [`ToolRegistrar`] and runs calls through [`ToolExecutor`].

pub mod describe;
pub mod discovery;
pub mod executor;
pub mod health;
pub mod help;
pub mod host;
pub mod process;
pub mod registrar;

pub use describe::DescribeClient;
pub use discovery::{DiscoveryConfig, PluginDiscoverer};
pub use executor::{marshal_arguments, ExecutionOutput, ExecutorConfig, ToolExecutor};
pub use health::{health_document, HealthTool};
pub use help::parse_commands_from_help;
pub use host::{HostConfig, PluginHost, ReloadReport};
pub use registrar::{PluginCommandTool, Tool, ToolBox, ToolRegistrar, ToolTable};
