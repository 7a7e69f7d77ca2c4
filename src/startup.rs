use crate::configuration::Settings;
use crate::mcp;
use crate::routes;
use actix_cors::Cors;
use actix_web::dev::{Server, ServerHandle};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

/// Port the listener actually bound, which differs from the configured one
/// when the configuration asks for port 0.
#[derive(Debug, Clone, Copy)]
pub struct BoundAddress {
    pub port: u16,
}

pub struct Application {
    port: u16,
    server: Server,
    shutdown: ShutdownHandle,
}

impl Application {
    pub fn build(settings: Settings) -> anyhow::Result<Self> {
        let address = format!("{}:{}", settings.app_host, settings.app_port);
        let listener =
            TcpListener::bind(&address).with_context(|| format!("failed to bind to {}", address))?;
        let registry = mcp::tools::default_registry()?;

        Self::with_listener(listener, settings, registry)
    }

    pub fn with_listener(
        listener: TcpListener,
        settings: Settings,
        registry: mcp::ToolRegistry,
    ) -> anyhow::Result<Self> {
        let port = listener.local_addr()?.port();
        tracing::info!(
            tools = registry.count(),
            "MCP Send Messages Httpstream Server running on http://{}:{}",
            settings.app_host,
            port
        );

        let grace = Duration::from_secs(settings.shutdown_timeout_secs);
        let (server, sessions) = run(listener, settings, Arc::new(registry))?;
        let shutdown = ShutdownHandle {
            sessions,
            server: server.handle(),
            grace,
        };

        Ok(Self {
            port,
            server,
            shutdown,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serves until SIGINT/SIGTERM, then drains sessions before the HTTP
    /// server lets go of its connections.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.shutdown().await;
        });

        self.server.await
    }
}

/// Triggers the ordered shutdown: stop accepting sessions, drain them, then
/// stop the HTTP server.
#[derive(Clone)]
pub struct ShutdownHandle {
    sessions: Arc<mcp::SessionManager>,
    server: ServerHandle,
    grace: Duration,
}

impl ShutdownHandle {
    pub fn sessions(&self) -> &mcp::SessionManager {
        &self.sessions
    }

    pub async fn shutdown(&self) {
        self.sessions.shutdown(self.grace).await;
        self.server.stop(true).await;
        tracing::info!("Server stopped");
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub fn run(
    listener: TcpListener,
    settings: Settings,
    registry: Arc<mcp::ToolRegistry>,
) -> Result<(Server, Arc<mcp::SessionManager>), std::io::Error> {
    let port = listener.local_addr()?.port();
    let mcp_path = settings.mcp_path();
    let shutdown_timeout = settings.shutdown_timeout_secs;

    let engine = mcp::InvocationEngine::new(registry);
    let dispatcher = Arc::new(mcp::McpDispatcher::new(engine, &settings.service_name));
    let sessions = Arc::new(mcp::SessionManager::new(dispatcher));

    tracing::info!(path = %mcp_path, "Mounting MCP endpoint");

    let settings = web::Data::new(settings);
    let bound = web::Data::new(BoundAddress { port });
    let sessions_data = web::Data::from(sessions.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .service(routes::root_handler)
            .service(routes::help_handler)
            .service(
                web::resource(mcp_path.as_str())
                    .route(web::post().to(mcp::mcp_post))
                    .route(web::get().to(mcp::mcp_websocket))
                    .route(web::delete().to(mcp::mcp_delete)),
            )
            .app_data(settings.clone())
            .app_data(bound.clone())
            .app_data(sessions_data.clone())
    })
    // shutdown is driven by ShutdownHandle so sessions drain first
    .disable_signals()
    .shutdown_timeout(shutdown_timeout)
    .listen(listener)?
    .run();

    Ok((server, sessions))
}
