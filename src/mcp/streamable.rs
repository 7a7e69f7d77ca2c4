//! Streamable HTTP transport: one JSON-RPC message per POST.
//!
//! `initialize` without an `Mcp-Session-Id` header opens a session and a
//! successful response hands the id back in that header. Every later request names its
//! session in the header; DELETE closes it.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::Value;
use tokio::sync::oneshot;

use super::error::McpError;
use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::session::{SessionManager, StreamKind};

pub const SESSION_HEADER: &str = "Mcp-Session-Id";

fn session_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn session_not_open(id: Option<Value>, err: &McpError) -> HttpResponse {
    HttpResponse::NotFound().json(JsonRpcResponse::error(id, JsonRpcError::from(err)))
}

#[tracing::instrument(name = "MCP streamable HTTP request", skip_all)]
pub async fn mcp_post(
    req: HttpRequest,
    body: web::Bytes,
    sessions: web::Data<SessionManager>,
) -> HttpResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("[MCP] Failed to parse JSON-RPC request: {}", e);
            return HttpResponse::BadRequest()
                .json(JsonRpcResponse::error(None, JsonRpcError::parse_error()));
        }
    };

    // `handshake` marks a session opened by this very request.
    let (session, handshake) = match session_header(&req) {
        Some(id) => match sessions.get(id) {
            Ok(session) => (session, false),
            Err(err) => {
                tracing::warn!("[MCP] Request for unknown or closed session {}", id);
                return session_not_open(request.id, &err);
            }
        },
        None if request.method == "initialize" => {
            // Over HTTP the stream is ready as soon as the session exists.
            let opened = sessions
                .open(StreamKind::StreamableHttp)
                .and_then(|session| sessions.activate(&session).map(|_| session));
            match opened {
                Ok(session) => (session, true),
                Err(err) => {
                    tracing::error!("[MCP] Could not open session: {}", err);
                    return HttpResponse::ServiceUnavailable()
                        .json(JsonRpcResponse::error(request.id, JsonRpcError::from(&err)));
                }
            }
        }
        None => {
            return HttpResponse::BadRequest().json(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("Mcp-Session-Id header is required"),
            ));
        }
    };

    let request_id = request.id.clone();
    let (tx, rx) = oneshot::channel();
    if let Err(err) = session.submit(
        request,
        Box::new(move |response| {
            let _ = tx.send(response);
        }),
    ) {
        return session_not_open(request_id, &err);
    }

    match rx.await {
        // A rejected initialize never establishes the session.
        Ok(Some(response)) if handshake && response.error.is_some() => {
            tracing::warn!("[MCP] Initialize rejected, discarding session {}", session.id());
            sessions.close(session.id());
            HttpResponse::Ok().json(response)
        }
        Ok(None) if handshake => {
            sessions.close(session.id());
            HttpResponse::Accepted().finish()
        }
        Ok(Some(response)) => HttpResponse::Ok()
            .insert_header((SESSION_HEADER, session.id()))
            .json(response),
        Ok(None) => HttpResponse::Accepted()
            .insert_header((SESSION_HEADER, session.id()))
            .finish(),
        // worker dropped the reply: the session went away mid-request
        Err(_) => session_not_open(
            request_id,
            &McpError::SessionNotOpen(session.id().to_string()),
        ),
    }
}

#[tracing::instrument(name = "MCP session close", skip_all)]
pub async fn mcp_delete(req: HttpRequest, sessions: web::Data<SessionManager>) -> HttpResponse {
    match session_header(&req) {
        Some(id) => {
            if !sessions.close(id) {
                tracing::debug!("[MCP] Close of unknown or closed session {} ignored", id);
            }
            HttpResponse::NoContent().finish()
        }
        None => HttpResponse::BadRequest().json(JsonRpcResponse::error(
            None,
            JsonRpcError::invalid_request("Mcp-Session-Id header is required"),
        )),
    }
}
