use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::http::header;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::McpError;
use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::session::{Session, SessionManager, StreamKind};

/// WebSocket heartbeat interval
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// Client timeout - close connection if no heartbeat received
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One session per socket. The session opens when the actor starts and
/// closes when it stops.
pub struct McpWebSocket {
    session: Arc<Session>,
    sessions: Arc<SessionManager>,
    hb: Instant,
}

impl McpWebSocket {
    pub fn new(session: Arc<Session>, sessions: Arc<SessionManager>) -> Self {
        Self {
            session,
            sessions,
            hb: Instant::now(),
        }
    }

    /// Pings the client and drops it when silent for too long or when the
    /// session was closed from the server side.
    fn hb(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if !act.session.is_open() {
                tracing::info!(session = %act.session.id(), "Session closed, disconnecting");
                ctx.close(Some(ws::CloseCode::Away.into()));
                ctx.stop();
                return;
            }

            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!("MCP WebSocket client heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    fn send(ctx: &mut <Self as Actor>::Context, response: &JsonRpcResponse) {
        match serde_json::to_string(response) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!("[MCP] Failed to serialize response: {}", e),
        }
    }
}

impl Actor for McpWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Err(err) = self.sessions.activate(&self.session) {
            tracing::error!(session = %self.session.id(), "Could not open session: {}", err);
            ctx.close(Some(ws::CloseCode::Again.into()));
            ctx.stop();
            return;
        }

        tracing::info!(
            "MCP WebSocket connection started: session_id={}",
            self.session.id()
        );
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.sessions.close(self.session.id());
        tracing::info!(
            "MCP WebSocket connection closed: session_id={}",
            self.session.id()
        );
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for McpWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                tracing::debug!("[MCP] Received JSON-RPC message: {}", text);

                let request: JsonRpcRequest = match serde_json::from_str(&text) {
                    Ok(req) => req,
                    Err(e) => {
                        tracing::error!("[MCP] Failed to parse JSON-RPC request: {}", e);
                        Self::send(ctx, &JsonRpcResponse::error(None, JsonRpcError::parse_error()));
                        return;
                    }
                };

                // The session worker answers in arrival order; the actor
                // mailbox keeps that order on the way out.
                let request_id = request.id.clone();
                let addr = ctx.address();
                let submitted = self.session.submit(
                    request,
                    Box::new(move |response| match response {
                        Some(response) => addr.do_send(SendResponse(response)),
                        None => tracing::debug!("[MCP] Dropped response for notification (no id)"),
                    }),
                );

                if let Err(err) = submitted {
                    tracing::warn!("[MCP] Message on closed session: {}", err);
                    Self::send(
                        ctx,
                        &JsonRpcResponse::error(request_id, JsonRpcError::from(&err)),
                    );
                    ctx.stop();
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported in MCP protocol");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("MCP WebSocket close received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!("MCP WebSocket protocol error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Message to send JSON-RPC response back to client
#[derive(actix::Message)]
#[rtype(result = "()")]
struct SendResponse(JsonRpcResponse);

impl actix::Handler<SendResponse> for McpWebSocket {
    type Result = ();

    fn handle(&mut self, msg: SendResponse, ctx: &mut Self::Context) {
        tracing::debug!(
            "[MCP] Sending JSON-RPC response: id={:?}, has_result={}, has_error={}",
            msg.0.id,
            msg.0.result.is_some(),
            msg.0.error.is_some(),
        );
        Self::send(ctx, &msg.0);
    }
}

fn is_websocket_upgrade(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// GET on the protocol endpoint: WebSocket upgrade, one session per socket.
#[tracing::instrument(name = "MCP WebSocket connection", skip_all)]
pub async fn mcp_websocket(
    req: HttpRequest,
    stream: web::Payload,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, Error> {
    if !is_websocket_upgrade(&req) {
        // no server-initiated SSE stream is offered
        return Ok(HttpResponse::MethodNotAllowed()
            .insert_header((header::ALLOW, "POST, DELETE"))
            .finish());
    }

    let sessions = sessions.into_inner();
    let session = match sessions.open(StreamKind::WebSocket) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("Could not open session: {}", err);
            return Ok(HttpResponse::ServiceUnavailable()
                .json(JsonRpcResponse::error(None, JsonRpcError::from(&err))));
        }
    };
    tracing::info!(session = %session.id(), "New MCP WebSocket connection request");

    let session_id = session.id().to_string();
    ws::start(McpWebSocket::new(session, sessions.clone()), &req, stream).map_err(|e| {
        // Handshake failed: the session never reached Open.
        sessions.close(&session_id);
        let err = McpError::Transport(e.to_string());
        tracing::warn!("{}", err);
        e
    })
}
