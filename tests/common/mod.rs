#![allow(dead_code)]

use message_gateway::configuration::{Settings, DEFAULT_CLIENT_EXAMPLE, DEFAULT_SERVICE_NAME};
use message_gateway::mcp::tools::default_registry;
use message_gateway::mcp::SESSION_HEADER;
use message_gateway::startup::{Application, ShutdownHandle};
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub shutdown: ShutdownHandle,
}

impl TestApp {
    pub fn mcp_url(&self) -> String {
        format!("{}/{}/mcp", self.address, DEFAULT_SERVICE_NAME)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/{}/mcp", self.port, DEFAULT_SERVICE_NAME)
    }

    /// POST one JSON-RPC message, optionally inside a session.
    pub async fn post(&self, session: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = reqwest::Client::new()
            .post(self.mcp_url())
            .header("Accept", "application/json, text/event-stream")
            .json(&body);
        if let Some(id) = session {
            request = request.header(SESSION_HEADER, id);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Runs `initialize` and returns the new session id.
    pub async fn initialize(&self) -> String {
        let response = self
            .post(
                None,
                json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "method": "initialize",
                    "params": {
                        "protocolVersion": "2025-03-26",
                        "capabilities": {},
                        "clientInfo": { "name": "test-client", "version": "1.0.0" }
                    }
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);

        response
            .headers()
            .get(SESSION_HEADER)
            .expect("initialize must return a session id")
            .to_str()
            .unwrap()
            .to_string()
    }

    pub async fn call_tool(&self, session: &str, id: u64, name: &str, arguments: Value) -> Value {
        self.post(
            Some(session),
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": { "name": name, "arguments": arguments }
            }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse JSON-RPC response")
    }
}

pub fn test_settings() -> Settings {
    Settings {
        app_host: "127.0.0.1".to_string(),
        app_port: 0,
        service_name: DEFAULT_SERVICE_NAME.to_string(),
        expose_url: None,
        client_example: DEFAULT_CLIENT_EXAMPLE.to_string(),
        shutdown_timeout_secs: 1,
    }
}

pub async fn spawn_app_with_configuration(settings: Settings) -> TestApp {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let registry = default_registry().expect("Failed to build tool registry");
    let application = Application::with_listener(listener, settings, registry)
        .expect("Failed to build application.");
    let shutdown = application.shutdown_handle();

    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address,
        port,
        shutdown,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_configuration(test_settings()).await
}
