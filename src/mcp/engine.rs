use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::error::McpError;
use super::registry::{ToolOutput, ToolRegistry};
use super::session::Session;

/// Validates and dispatches tool calls against the registry.
///
/// Every failure comes back as an [`McpError`]; nothing a handler does can
/// take the session down.
#[derive(Clone)]
pub struct InvocationEngine {
    registry: Arc<ToolRegistry>,
}

impl InvocationEngine {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(
        &self,
        session: &Session,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolOutput, McpError> {
        if !session.is_open() {
            return Err(McpError::SessionNotOpen(session.id().to_string()));
        }

        let tool = self.registry.lookup(tool_name).map_err(|e| {
            tracing::warn!("Tool not found: {}", tool_name);
            e
        })?;

        tool.schema.validate(&arguments).map_err(|violations| {
            tracing::warn!(
                tool = %tool_name,
                violations = violations.len(),
                "Rejected tool arguments"
            );
            McpError::ArgumentValidation(violations)
        })?;

        let outcome = AssertUnwindSafe(tool.handler.execute(arguments))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(output)) => {
                tracing::info!("Tool executed successfully");
                Ok(output)
            }
            Ok(Err(message)) => {
                tracing::error!("Tool execution failed: {}", message);
                Err(McpError::ToolExecution {
                    tool: tool_name.to_string(),
                    message,
                })
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                tracing::error!("Tool handler panicked: {}", message);
                Err(McpError::ToolExecution {
                    tool: tool_name.to_string(),
                    message,
                })
            }
        }
    }
}
