//! Built-in `health` tool

use crate::registrar::Tool;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use smcp_core::{
    ExecutionError, PluginRegistry, ServerMetrics, ToolAnnotations, ToolDescriptor, ToolOutput,
    ToolParameterSchema,
};
use std::sync::Arc;
use std::time::Instant;

/// Health document shared by the `health` tool and the HTTP endpoint.
pub fn health_document(registry: &PluginRegistry, metrics: &ServerMetrics) -> Value {
    json!({
        "status": "healthy",
        "plugins": registry.len(),
        "plugin_names": registry.names(),
        "metrics": metrics.snapshot(),
    })
}

/// Reports server status and the plugins of the registry it was built for
pub struct HealthTool {
    descriptor: ToolDescriptor,
    registry: Arc<PluginRegistry>,
    metrics: Arc<ServerMetrics>,
}

impl HealthTool {
    pub const NAME: &'static str = "health";

    pub fn new(registry: Arc<PluginRegistry>, metrics: Arc<ServerMetrics>) -> Self {
        let descriptor = ToolDescriptor::new(
            Self::NAME,
            "Check server health and plugin status",
            ToolParameterSchema::empty_object(),
            ToolAnnotations::read_only("Health Check"),
        );
        Self {
            descriptor,
            registry,
            metrics,
        }
    }
}

#[async_trait]
impl Tool for HealthTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<ToolOutput, ExecutionError> {
        let started = Instant::now();
        let document = health_document(&self.registry, &self.metrics);
        let text = serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string());
        Ok(ToolOutput::text(text, started.elapsed()))
    }
}
