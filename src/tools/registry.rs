//! Tool registry for managing available tools
//!
//! The registry is the tool invoker of a turn: it resolves a call by name and
//! turns every outcome, including an unknown name, into a [`ToolResult`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::tool::{Tool, ToolResult};
use crate::core::AgentResult;
use crate::llm::ToolDefinition;

/// Registry that holds all available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool in the registry
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        tracing::info!("[ToolRegistry] Registering tool: {}", name);
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations for every registered tool, sorted by name so requests
    /// are stable across runs
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Invoke a tool by name with structured arguments.
    ///
    /// Unknown tools produce an error result that is sent back to the model.
    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> AgentResult<ToolResult> {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("[ToolRegistry] Model requested unknown tool: {}", name);
            return Ok(ToolResult::error(format!("Tool not found: {}", name)));
        };

        tracing::info!("[ToolRegistry] Executing tool: {}", name);
        tracing::debug!("[ToolRegistry] Input: {:?}", arguments);

        let result = tool.execute(&Value::Object(arguments.clone())).await?;

        tracing::debug!(
            "[ToolRegistry] Tool {} completed. Is error: {}",
            name,
            result.is_error
        );

        Ok(result)
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
