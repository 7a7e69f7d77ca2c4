use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::McpError;
use super::protocol::Tool;
use super::schema::ParameterSchema;

/// What a handler reports back: a human-readable summary and, optionally, the
/// same facts as structured data.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Option<Value>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured = Some(structured);
        self
    }
}

/// Trait for tool handlers
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool. `args` has already been validated against the
    /// tool's schema.
    async fn execute(&self, args: Value) -> Result<ToolOutput, String>;
}

/// A registered tool: identity, catalog metadata and the handler behind it.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: ParameterSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: &str,
        description: &str,
        schema: ParameterSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler,
        }
    }

    /// Catalog entry advertised by tools/list
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_json_schema(),
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Catalog of invocable tools.
///
/// Filled once at startup and shared read-only (behind an `Arc`) by every
/// session afterwards, so lookups take no lock.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique.
    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), McpError> {
        if self.by_name.contains_key(&tool.name) {
            return Err(McpError::DuplicateTool(tool.name));
        }
        tracing::debug!(tool = %tool.name, "Registering tool");
        self.by_name.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Result<&ToolDefinition, McpError> {
        self.by_name
            .get(name)
            .map(|&index| &self.tools[index])
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))
    }

    /// Tools in registration order. Each call starts a fresh iteration.
    pub fn list(&self) -> impl Iterator<Item = &ToolDefinition> + '_ {
        self.tools.iter()
    }

    /// Catalog as advertised by tools/list
    pub fn list_tools(&self) -> Vec<Tool> {
        self.list().map(ToolDefinition::to_tool).collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::schema::{ParamType, ScalarType};

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
            Ok(ToolOutput::text(args.to_string()))
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "echoes its input",
            ParameterSchema::new().required("value", ParamType::Scalar(ScalarType::String), ""),
            Arc::new(Echo),
        )
    }

    #[test]
    fn lookup_returns_registered_definition() {
        let mut registry = ToolRegistry::new();
        let definition = tool("echo");
        let handler = definition.handler.clone();
        registry.register(definition).unwrap();

        let found = registry.lookup("echo").unwrap();
        assert_eq!(found.name, "echo");
        assert_eq!(found.description, "echoes its input");
        assert_eq!(found.schema, tool("echo").schema);
        assert!(Arc::ptr_eq(&found.handler, &handler));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("echo")).unwrap();

        let err = registry.register(tool("echo")).unwrap_err();
        assert!(matches!(err, McpError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unknown_name_fails() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.lookup("send_fax"),
            Err(McpError::UnknownTool(name)) if name == "send_fax"
        ));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn list_is_in_registration_order_and_restartable() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(tool(name)).unwrap();
        }

        let first: Vec<&str> = registry.list().map(|t| t.name.as_str()).collect();
        let second: Vec<&str> = registry.list().map(|t| t.name.as_str()).collect();
        assert_eq!(first, vec!["zeta", "alpha", "mid"]);
        assert_eq!(first, second);

        let tools = registry.list_tools();
        assert_eq!(tools[0].input_schema["required"], serde_json::json!(["value"]));
    }
}
