use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Result of running a tool through the tool backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRun {
    pub output: String,
    pub exit_status: i32,
}

impl ToolRun {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }
}

/// The tool-execution backend workers call into. Implementations own their
/// sandboxing.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn run_tool(&self, tool_id: &str, args: Value) -> Result<ToolRun>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a new registry with the built-in tools (journal, python_repl)
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::tools::journal::Journal::new()));
        registry.register(Arc::new(crate::tools::python::PythonRepl::default()));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value> {
        if let Some(tool) = self.tools.get(name) {
            tool.execute(args).await
        } else {
            Err(AppError::NotFound(format!("Tool not found: {}", name)))
        }
    }

    /// Get a sorted list of all registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a tool is registered
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[async_trait]
impl ToolBackend for ToolRegistry {
    async fn run_tool(&self, tool_id: &str, args: Value) -> Result<ToolRun> {
        let value = self.execute(tool_id, args).await?;

        let exit_status = value
            .get("exit_status")
            .and_then(Value::as_i64)
            .map(|s| s as i32)
            .unwrap_or(0);
        let output = match value.get("output") {
            Some(Value::String(s)) => s.clone(),
            _ => value.to_string(),
        };

        tracing::debug!(tool = tool_id, exit_status, "Tool finished");
        Ok(ToolRun {
            output,
            exit_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.tool_names().len(), 0);
    }

    #[test]
    fn test_registry_with_default_tools() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(
            registry.tool_names(),
            vec!["journal", "python_repl"]
        );
    }

    #[tokio::test]
    async fn test_run_tool_wraps_structured_output() {
        let registry = ToolRegistry::with_default_tools();
        let run = registry
            .run_tool("journal", json!({"operation": "add", "entry": "standup moved"}))
            .await
            .unwrap();

        assert!(run.succeeded());
        assert!(run.output.ends_with("standup moved"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let registry = ToolRegistry::with_default_tools();
        let result = registry.run_tool("shell", json!({})).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
