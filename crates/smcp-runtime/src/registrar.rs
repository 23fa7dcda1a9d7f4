//! Tool registration
//!
//! Flattens a [`PluginRegistry`] into a [`ToolTable`]: one tool per plugin
//! command plus the built-in tools. Every pass builds a brand-new table.

use crate::executor::ToolExecutor;
use crate::health::HealthTool;
use async_trait::async_trait;
use serde_json::{Map, Value};
use smcp_core::{
    CommandSpec, EntryPoint, ExecutionError, PluginRegistry, ServerMetrics, ToolDescriptor,
    ToolOutput,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, schema and annotations exposed to clients
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool with already-parsed arguments
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ExecutionError>;
}

/// Shared handle to a tool
pub type ToolBox = Arc<dyn Tool>;

/// A plugin command bound to the shared executor
pub struct PluginCommandTool {
    descriptor: ToolDescriptor,
    entry_point: EntryPoint,
    command: String,
    executor: ToolExecutor,
}

impl PluginCommandTool {
    pub fn new(
        plugin: &str,
        entry_point: EntryPoint,
        command: &CommandSpec,
        executor: ToolExecutor,
    ) -> Self {
        Self {
            descriptor: ToolDescriptor::for_command(plugin, command),
            entry_point,
            command: command.name.clone(),
            executor,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Tool for PluginCommandTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ExecutionError> {
        let output = self
            .executor
            .execute(&self.entry_point, &self.command, &arguments)
            .await?;
        Ok(ToolOutput::text(output.stdout, output.duration))
    }
}

/// Tools by qualified name
#[derive(Clone, Default)]
pub struct ToolTable {
    tools: BTreeMap<String, ToolBox>,
}

impl ToolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning the one it replaced.
    pub fn register(&mut self, tool: ToolBox) -> Option<ToolBox> {
        let name = tool.descriptor().qualified_name.clone();
        self.tools.insert(name, tool)
    }

    pub fn get(&self, name: &str) -> Option<&ToolBox> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolTable")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds tool tables from registries
#[derive(Debug, Clone)]
pub struct ToolRegistrar {
    executor: ToolExecutor,
    metrics: Arc<ServerMetrics>,
}

impl ToolRegistrar {
    pub fn new(executor: ToolExecutor, metrics: Arc<ServerMetrics>) -> Self {
        Self { executor, metrics }
    }

    /// Build a fresh table for `registry`, including the built-in tools.
    ///
    /// A qualified name registered twice keeps the later tool and logs a
    /// conflict.
    pub fn register_all(&self, registry: &Arc<PluginRegistry>) -> ToolTable {
        let mut table = ToolTable::new();
        let mut plugin_tools = 0usize;

        for plugin in registry.plugins() {
            for command in plugin.commands.values() {
                let tool = PluginCommandTool::new(
                    &plugin.name,
                    plugin.entry_point.clone(),
                    command,
                    self.executor.clone(),
                );
                let name = tool.descriptor().qualified_name.clone();
                if table.register(Arc::new(tool)).is_some() {
                    warn!(tool = %name, "Registration conflict, replacing earlier tool");
                }
                debug!(tool = %name, method = %plugin.method, "Registered tool");
                plugin_tools += 1;
            }
        }

        let health = HealthTool::new(Arc::clone(registry), Arc::clone(&self.metrics));
        if table.register(Arc::new(health)).is_some() {
            warn!(tool = HealthTool::NAME, "Registration conflict, built-in tool replaces plugin tool");
        }

        self.metrics.record_registration(registry.len(), plugin_tools);
        info!(
            plugins = registry.len(),
            tools = table.len(),
            "Tool registration complete"
        );
        table
    }
}
