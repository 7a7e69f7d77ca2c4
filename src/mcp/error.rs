use serde::Serialize;
use std::fmt;

/// One reason an argument payload does not satisfy a tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub parameter: String,
    pub reason: ViolationReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationReason {
    Missing,
    TypeMismatch {
        expected: String,
        found: String,
    },
    /// The payload itself is not a JSON object.
    NotAnObject {
        found: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ViolationReason::Missing => write!(f, "'{}' is required", self.parameter),
            ViolationReason::TypeMismatch { expected, found } => write!(
                f,
                "'{}' must be {}, got {}",
                self.parameter, expected, found
            ),
            ViolationReason::NotAnObject { found } => {
                write!(f, "arguments must be an object, got {}", found)
            }
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Session not open: {0}")]
    SessionNotOpen(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {}", join_violations(.0))]
    ArgumentValidation(Vec<Violation>),

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl McpError {
    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotOpen(_) => "session_not_open",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ArgumentValidation(_) => "argument_validation",
            Self::ToolExecution { .. } => "tool_execution",
            Self::DuplicateTool(_) => "duplicate_tool",
            Self::Transport(_) => "transport",
        }
    }

    /// JSON-RPC error code used when the error is sent over the wire.
    pub fn code(&self) -> i32 {
        match self {
            Self::SessionNotOpen(_) => -32000,
            Self::UnknownTool(_) => -32001,
            Self::ArgumentValidation(_) => -32602,
            Self::ToolExecution { .. } => -32002,
            Self::DuplicateTool(_) | Self::Transport(_) => -32603,
        }
    }

    /// Names of the offending parameters, in schema order.
    pub fn offending_parameters(&self) -> Vec<&str> {
        match self {
            Self::ArgumentValidation(violations) => {
                violations.iter().map(|v| v.parameter.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_violation() {
        let err = McpError::ArgumentValidation(vec![
            Violation {
                parameter: "emails".to_string(),
                reason: ViolationReason::Missing,
            },
            Violation {
                parameter: "subject".to_string(),
                reason: ViolationReason::TypeMismatch {
                    expected: "string".to_string(),
                    found: "number".to_string(),
                },
            },
        ]);

        assert_eq!(
            err.to_string(),
            "Invalid arguments: 'emails' is required; 'subject' must be string, got number"
        );
        assert_eq!(err.offending_parameters(), vec!["emails", "subject"]);
        assert_eq!(err.kind(), "argument_validation");
    }

    #[test]
    fn kinds_and_codes() {
        assert_eq!(McpError::SessionNotOpen("s".into()).code(), -32000);
        assert_eq!(McpError::UnknownTool("x".into()).kind(), "unknown_tool");
        assert_eq!(McpError::Transport("x".into()).kind(), "transport");
    }
}
