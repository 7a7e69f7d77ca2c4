use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::Instrument;

use super::engine::InvocationEngine;
use super::error::McpError;
use super::protocol::{
    CallToolRequest, CallToolResponse, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo, ToolListResponse,
    ToolsCapability, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use super::session::{RequestHandler, Session};

/// Routes JSON-RPC methods to the invocation engine. Shared by every session
/// and every transport.
pub struct McpDispatcher {
    engine: InvocationEngine,
    server_name: String,
}

impl McpDispatcher {
    pub fn new(engine: InvocationEngine, server_name: &str) -> Self {
        Self {
            engine,
            server_name: server_name.to_string(),
        }
    }

    fn handle_initialize(&self, session: &Session, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = match parse_params(&req) {
            Ok(params) => params,
            Err(error) => return JsonRpcResponse::error(req.id, error),
        };

        tracing::info!(
            session = %session.id(),
            "MCP client initialized: protocol_version={}, client={}",
            params.protocol_version,
            params
                .client_info
                .as_ref()
                .map(|c| c.name.as_str())
                .unwrap_or("unknown")
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        JsonRpcResponse::from_serializable(req.id, &result)
    }

    fn handle_tools_list(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let tools = self.engine.registry().list_tools();

        tracing::debug!("Listing {} available tools", tools.len());

        JsonRpcResponse::from_serializable(req.id, &ToolListResponse { tools })
    }

    async fn handle_tools_call(&self, session: &Session, req: JsonRpcRequest) -> JsonRpcResponse {
        let call_req: CallToolRequest = match parse_params(&req) {
            Ok(params) => params,
            Err(error) => return JsonRpcResponse::error(req.id, error),
        };

        let tool_span = tracing::info_span!(
            "mcp_tool_call",
            tool = %call_req.name,
            session = %session.id()
        );

        let outcome = self
            .engine
            .invoke(
                session,
                &call_req.name,
                call_req.arguments.unwrap_or(Value::Null),
            )
            .instrument(tool_span)
            .await;

        match outcome {
            Ok(output) => {
                let mut response = CallToolResponse::text(output.text);
                response.structured_content = output.structured;
                JsonRpcResponse::from_serializable(req.id, &response)
            }
            // Handler failures are tool results, not protocol errors.
            Err(err @ McpError::ToolExecution { .. }) => {
                JsonRpcResponse::from_serializable(req.id, &CallToolResponse::error(&err))
            }
            Err(err) => JsonRpcResponse::error(req.id, JsonRpcError::from(&err)),
        }
    }
}

#[async_trait]
impl RequestHandler for McpDispatcher {
    async fn handle(&self, session: &Session, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        // A null id is neither a request nor a notification in MCP
        if req.has_null_id() {
            tracing::warn!("Rejecting request with null id: method={}", req.method);
            return Some(JsonRpcResponse::error(
                req.id,
                JsonRpcError::invalid_request("id must not be null"),
            ));
        }

        // Notifications arrive without an id and must not receive a response per JSON-RPC 2.0
        if req.is_notification() {
            if req.method.starts_with("notifications/") {
                tracing::debug!("Ignoring notification: method={}", req.method);
            } else {
                tracing::warn!("Ignoring notification without id: method={}", req.method);
            }
            return None;
        }

        if req.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                req.id,
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(session, req),
            "ping" => JsonRpcResponse::success(req.id, json!({})),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(session, req).await,
            _ => JsonRpcResponse::error(req.id, JsonRpcError::method_not_found(&req.method)),
        };

        Some(response)
    }
}

fn parse_params<T: DeserializeOwned>(req: &JsonRpcRequest) -> Result<T, JsonRpcError> {
    match &req.params {
        Some(p) => serde_json::from_value(p.clone())
            .map_err(|e| JsonRpcError::invalid_params(&e.to_string())),
        None => Err(JsonRpcError::invalid_params("Missing params")),
    }
}
