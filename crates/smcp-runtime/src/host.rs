//! Plugin host
//!
//! The context object owning everything a running server needs: discovery,
//! the current registry and tool table, the executor and the metrics. Hosts
//! are constructed explicitly, so tests can run as many side by side as
//! they like.
//!
//! Registry and tool table are published together as one `Arc` snapshot.
//! A reload builds the next snapshot completely before swapping it in, and
//! calls that already resolved a tool keep running against the old one.

use crate::discovery::{DiscoveryConfig, PluginDiscoverer};
use crate::executor::{ExecutorConfig, ToolExecutor};
use crate::health::health_document;
use crate::registrar::{ToolRegistrar, ToolTable};
use serde_json::{Map, Value};
use smcp_core::{
    DiscoveryError, PluginRegistry, ServerMetrics, ToolCallError, ToolDescriptor, ToolOutput,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub plugins_dir: PathBuf,
    pub discovery: DiscoveryConfig,
    pub executor: ExecutorConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from("plugins"),
            discovery: DiscoveryConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}

/// Counts from one discovery and registration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub plugins: usize,
    pub tools: usize,
}

#[derive(Debug, Default)]
struct Snapshot {
    registry: Arc<PluginRegistry>,
    tools: Arc<ToolTable>,
}

pub struct PluginHost {
    config: HostConfig,
    discoverer: PluginDiscoverer,
    registrar: ToolRegistrar,
    metrics: Arc<ServerMetrics>,
    current: RwLock<Arc<Snapshot>>,
}

impl PluginHost {
    /// Create a host with an empty registry; call [`PluginHost::reload`] to populate it.
    pub fn new(config: HostConfig) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let discoverer = PluginDiscoverer::new(config.discovery.clone());
        let registrar = ToolRegistrar::new(
            ToolExecutor::new(config.executor.clone()),
            Arc::clone(&metrics),
        );
        Self {
            config,
            discoverer,
            registrar,
            metrics,
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.config.plugins_dir
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Rediscover all plugins and replace the tool table.
    ///
    /// On error the previous snapshot stays active.
    #[instrument(skip(self), fields(plugins_dir = %self.config.plugins_dir.display()))]
    pub async fn reload(&self) -> Result<ReloadReport, DiscoveryError> {
        let registry = self.discoverer.discover(&self.config.plugins_dir).await?;
        Ok(self.install(registry).await)
    }

    /// Register `registry` and publish it with its tool table.
    pub async fn install(&self, registry: PluginRegistry) -> ReloadReport {
        let registry = Arc::new(registry);
        let tools = Arc::new(self.registrar.register_all(&registry));
        let report = ReloadReport {
            plugins: registry.len(),
            tools: tools.len(),
        };

        let next = Arc::new(Snapshot { registry, tools });
        *self.current.write().await = next;
        info!(plugins = report.plugins, tools = report.tools, "Published tool table");
        report
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }

    pub async fn registry(&self) -> Arc<PluginRegistry> {
        Arc::clone(&self.snapshot().await.registry)
    }

    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.snapshot().await.tools.descriptors()
    }

    /// Resolve `name` against the current table and run it.
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolCallError> {
        let tool = {
            let snapshot = self.snapshot().await;
            snapshot.tools.get(name).cloned()
        };
        let Some(tool) = tool else {
            debug!("Unknown tool requested");
            return Err(ToolCallError::UnknownTool(name.to_string()));
        };

        let result = tool.call(arguments).await;
        self.metrics.record_call(result.is_ok());
        match &result {
            Ok(output) => {
                debug!(duration_ms = output.duration.as_millis() as u64, "Tool call succeeded")
            }
            Err(e) => warn!(error = %e, exit_code = ?e.exit_code(), "Tool call failed"),
        }
        result.map_err(ToolCallError::from)
    }

    /// Health document for the current registry
    pub async fn health(&self) -> Value {
        let registry = self.registry().await;
        health_document(&registry, &self.metrics)
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smcp_core::{CommandSpec, DiscoveryMethod, EntryPoint, PluginRecord};

    fn registry_with(plugin: &str, command: &str) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.insert(PluginRecord {
            name: plugin.into(),
            entry_point: EntryPoint::interpreted("sh", format!("/nonexistent/{}/cli.sh", plugin)),
            info: None,
            method: DiscoveryMethod::HelpText,
            commands: [(command.to_string(), CommandSpec::bare(command))]
                .into_iter()
                .collect(),
        });
        registry
    }

    #[tokio::test]
    async fn test_new_host_has_no_tools() {
        let host = PluginHost::new(HostConfig::default());
        assert!(host.list_tools().await.is_empty());
        assert!(host.registry().await.is_empty());
    }

    #[tokio::test]
    async fn test_install_publishes_tools() {
        let host = PluginHost::new(HostConfig::default());
        let report = host.install(registry_with("demo", "run")).await;
        assert_eq!(report, ReloadReport { plugins: 1, tools: 2 });

        let names: Vec<_> = host
            .list_tools()
            .await
            .into_iter()
            .map(|d| d.qualified_name)
            .collect();
        assert_eq!(names, vec!["demo.run", "health"]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let host = PluginHost::new(HostConfig::default());
        let err = host.call_tool("nope.nothing", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolCallError::UnknownTool(ref n) if n == "nope.nothing"));
        assert_eq!(host.metrics().snapshot().tool_calls_total, 0);
    }

    #[tokio::test]
    async fn test_health_tool_call_is_counted() {
        let host = PluginHost::new(HostConfig::default());
        host.install(registry_with("demo", "run")).await;

        let output = host.call_tool("health", Map::new()).await.unwrap();
        assert!(output.text.contains("\"demo\""));

        let health = host.health().await;
        assert_eq!(health["plugins"], 1);
        assert_eq!(health["metrics"]["tool_calls_total"], 1);
    }
}
