//! Tool trait: the interface every agent tool implements.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use polyagent_core::types::ToolDefinition;

/// Ordered tools resolved for one intent.
pub type ToolSet = Vec<Arc<dyn Tool>>;

/// The handler advertises tools via `to_definition()` and dispatches calls
/// via `execute()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the LLM to call this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the parameters: `{"type": "object", "properties": {...}}`.
    fn parameters(&self) -> Value;

    /// Run the tool. Errors are turned into text for the LLM by the registry.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}
