pub mod dispatch;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod session;
pub mod streamable;
pub mod tools;
pub mod websocket;

pub use dispatch::McpDispatcher;
pub use engine::InvocationEngine;
pub use error::{McpError, Violation, ViolationReason};
pub use protocol::*;
pub use registry::{ToolDefinition, ToolHandler, ToolOutput, ToolRegistry};
pub use schema::{ParamType, ParameterSchema, ScalarType};
pub use session::{RequestHandler, Session, SessionManager, SessionState, StreamKind};
pub use streamable::{mcp_delete, mcp_post, SESSION_HEADER};
pub use websocket::mcp_websocket;
