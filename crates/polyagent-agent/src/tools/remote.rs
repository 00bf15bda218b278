//! Remote MCP tools exposed through the [`Tool`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::base::Tool;
use crate::mcp::types::McpToolDef;
use crate::mcp::McpClient;

/// One tool advertised by a connected server.
pub struct RemoteTool {
    client: Arc<McpClient>,
    def: McpToolDef,
    description: String,
}

impl RemoteTool {
    pub fn new(client: Arc<McpClient>, def: McpToolDef) -> Self {
        let description = def
            .description
            .clone()
            .unwrap_or_else(|| format!("Tool '{}' from {}", def.name, client.name()));
        Self {
            client,
            def,
            description,
        }
    }

    /// Name of the server this tool lives on.
    pub fn server(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.def.input_schema.clone()
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let arguments = Value::Object(params.into_iter().collect());
        Ok(self.client.call_tool(&self.def.name, arguments).await?)
    }
}
