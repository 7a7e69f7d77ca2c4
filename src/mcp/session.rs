//! Session lifecycle for the streaming transports.
//!
//! A session moves `Opening -> Open -> Closed` and never leaves `Closed`.
//! Every session owns one worker task that drains its request queue in
//! arrival order; closing the session drops the queue's sender, so requests
//! still queued are answered with `session_not_open` instead of being run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::McpError;
use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

pub type SessionId = String;

/// Called exactly once per submitted request, from the session worker.
/// `None` means the request was a notification.
pub type Reply = Box<dyn FnOnce(Option<JsonRpcResponse>) + Send + 'static>;

/// The transport stream a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    StreamableHttp,
    WebSocket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Open,
    Closed,
}

/// Processes one protocol message on behalf of a session.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, session: &Session, request: JsonRpcRequest) -> Option<JsonRpcResponse>;
}

struct Job {
    request: JsonRpcRequest,
    reply: Reply,
}

impl Job {
    fn cancel(self, session_id: &str) {
        let response = self.request.id.map(|id| {
            let err = McpError::SessionNotOpen(session_id.to_string());
            JsonRpcResponse::error(Some(id), JsonRpcError::from(&err))
        });
        (self.reply)(response);
    }
}

struct Inner {
    state: SessionState,
    queue: Option<mpsc::UnboundedSender<Job>>,
    pending: Option<mpsc::UnboundedReceiver<Job>>,
    worker: Option<JoinHandle<()>>,
}

pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    stream: StreamKind,
    inner: Mutex<Inner>,
}

impl Session {
    fn new(stream: StreamKind) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            stream,
            inner: Mutex::new(Inner {
                state: SessionState::Opening,
                queue: Some(tx),
                pending: Some(rx),
                worker: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn state(&self) -> SessionState {
        self.inner().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Queue a request for in-order processing.
    pub fn submit(&self, request: JsonRpcRequest, reply: Reply) -> Result<(), McpError> {
        let inner = self.inner();
        let queue = match (&inner.state, &inner.queue) {
            (SessionState::Open, Some(queue)) => queue,
            _ => return Err(McpError::SessionNotOpen(self.id.clone())),
        };
        queue
            .send(Job { request, reply })
            .map_err(|_| McpError::SessionNotOpen(self.id.clone()))
    }

    /// Transition to `Closed`. Returns false if already closed.
    fn close(&self) -> bool {
        let mut inner = self.inner();
        if inner.state == SessionState::Closed {
            return false;
        }
        inner.state = SessionState::Closed;
        inner.queue = None;
        inner.pending = None;
        true
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.inner().worker.take()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("stream", &self.stream)
            .field("state", &self.state())
            .finish()
    }
}

async fn run_worker(
    session: Arc<Session>,
    mut queue: mpsc::UnboundedReceiver<Job>,
    handler: Arc<dyn RequestHandler>,
) {
    while let Some(job) = queue.recv().await {
        if !session.is_open() {
            job.cancel(&session.id);
            continue;
        }
        let response = handler.handle(&session, job.request).await;
        (job.reply)(response);
    }
    tracing::debug!(session = %session.id, "Session worker finished");
}

/// Owns the session table. Only the manager creates and closes sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    handler: Arc<dyn RequestHandler>,
    accepting: AtomicBool,
}

impl SessionManager {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            handler,
            accepting: AtomicBool::new(true),
        }
    }

    /// Create a session in `Opening`. The transport calls [`Self::activate`]
    /// once its stream is ready, or [`Self::close`] if the handshake fails.
    pub fn open(&self, stream: StreamKind) -> Result<Arc<Session>, McpError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(McpError::Transport("server is shutting down".to_string()));
        }
        let session = Arc::new(Session::new(stream));
        self.table_mut()
            .insert(session.id.clone(), session.clone());
        tracing::debug!(session = %session.id, ?stream, "Session opening");
        Ok(session)
    }

    /// `Opening -> Open`: starts the session worker.
    pub fn activate(&self, session: &Arc<Session>) -> Result<(), McpError> {
        if !self.accepting.load(Ordering::SeqCst) {
            self.close(&session.id);
            return Err(McpError::Transport("server is shutting down".to_string()));
        }

        let mut inner = session.inner();
        let queue = match (inner.state, inner.pending.take()) {
            (SessionState::Opening, Some(queue)) => queue,
            (state, _) => {
                return Err(McpError::Transport(format!(
                    "session {} cannot be activated from {:?}",
                    session.id, state
                )))
            }
        };
        inner.worker = Some(tokio::spawn(run_worker(
            session.clone(),
            queue,
            self.handler.clone(),
        )));
        inner.state = SessionState::Open;
        drop(inner);

        tracing::info!(session = %session.id, stream = ?session.stream, "Session open");
        Ok(())
    }

    /// Look up an open session.
    pub fn get(&self, id: &str) -> Result<Arc<Session>, McpError> {
        self.table()
            .get(id)
            .filter(|s| s.is_open())
            .cloned()
            .ok_or_else(|| McpError::SessionNotOpen(id.to_string()))
    }

    /// Idempotent: closing an unknown or already closed session does nothing.
    /// Returns whether this call performed the close.
    pub fn close(&self, id: &str) -> bool {
        let removed = self.table_mut().remove(id);
        match removed {
            Some(session) if session.close() => {
                let lifetime = Utc::now() - session.created_at();
                tracing::info!(
                    session = %id,
                    stream = ?session.stream(),
                    lifetime_ms = lifetime.num_milliseconds(),
                    "Session closed"
                );
                true
            }
            _ => false,
        }
    }

    pub fn open_count(&self) -> usize {
        self.table().values().filter(|s| s.is_open()).count()
    }

    /// Graceful drain: refuse new sessions, close every session, then wait up
    /// to `grace` for in-flight requests to finish.
    pub async fn shutdown(&self, grace: Duration) {
        self.accepting.store(false, Ordering::SeqCst);

        let sessions: Vec<Arc<Session>> = self.table_mut().drain().map(|(_, s)| s).collect();
        tracing::info!(count = sessions.len(), "Draining sessions");

        let workers: Vec<JoinHandle<()>> = sessions
            .iter()
            .filter_map(|session| {
                session.close();
                session.take_worker()
            })
            .collect();

        for worker in workers {
            match tokio::time::timeout(grace, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Session worker failed: {}", e),
                Err(_) => tracing::warn!("Session worker did not finish within {:?}", grace),
            }
        }
    }

    fn table(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn table_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
