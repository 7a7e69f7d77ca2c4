pub mod messaging;

pub use messaging::*;

use super::error::McpError;
use super::registry::ToolRegistry;

/// Registry with every built-in tool, in catalog order.
pub fn default_registry() -> Result<ToolRegistry, McpError> {
    let mut registry = ToolRegistry::new();
    registry.register(SendEmailTool::definition())?;
    registry.register(SendSmsTool::definition())?;
    Ok(registry)
}
