mod common;

use common::spawn_app;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn send(socket: &mut Socket, body: Value) {
    socket
        .send(Message::Text(body.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Next JSON text frame, skipping control frames.
async fn receive(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("Response is not JSON");
        }
    }
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

async fn wait_for_open_count(app: &common::TestApp, expected: usize) {
    for _ in 0..50 {
        if app.shutdown.sessions().open_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} open sessions, found {}",
        expected,
        app.shutdown.sessions().open_count()
    );
}

#[actix_web::test]
async fn socket_lifetime_is_session_lifetime() {
    let app = spawn_app().await;

    let (mut socket, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("Failed to connect");
    wait_for_open_count(&app, 1).await;

    socket.close(None).await.unwrap();
    wait_for_open_count(&app, 0).await;
}

#[actix_web::test]
async fn tools_over_websocket() {
    let app = spawn_app().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(app.ws_url()).await.unwrap();

    send(
        &mut socket,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2025-03-26", "capabilities": {} }
        }),
    )
    .await;
    let response = receive(&mut socket).await;
    assert_eq!(response["result"]["serverInfo"]["name"], "send_message_service");

    send(&mut socket, json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })).await;

    send(&mut socket, json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" })).await;
    let response = receive(&mut socket).await;
    assert_eq!(response["id"], 2);
    assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 2);

    send(&mut socket, tool_call(3, "send_fax", json!({}))).await;
    let response = receive(&mut socket).await;
    assert_eq!(response["error"]["data"]["kind"], "unknown_tool");

    send(
        &mut socket,
        tool_call(4, "send_sms", json!({ "phone_numbers": ["+1", "+2"], "message": "Ping" })),
    )
    .await;
    let response = receive(&mut socket).await;
    assert_eq!(
        response["result"]["content"][0]["text"],
        "SMS sent to 2 numbers (+1, +2) with message 'Ping'"
    );
}

#[actix_web::test]
async fn pipelined_requests_are_answered_in_order() {
    let app = spawn_app().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(app.ws_url()).await.unwrap();

    for id in 1..=10 {
        send(
            &mut socket,
            tool_call(
                id,
                "send_email",
                json!({ "emails": [format!("user{}@x.com", id)], "subject": "Hi", "body": "" }),
            ),
        )
        .await;
    }

    for id in 1..=10 {
        let response = receive(&mut socket).await;
        assert_eq!(response["id"], id);
        assert_eq!(
            response["result"]["structuredContent"]["recipients"][0],
            format!("user{}@x.com", id)
        );
    }
}

#[actix_web::test]
async fn malformed_frame_gets_parse_error_and_socket_survives() {
    let app = spawn_app().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(app.ws_url()).await.unwrap();

    socket.send(Message::Text("{oops".to_string())).await.unwrap();
    let response = receive(&mut socket).await;
    assert_eq!(response["error"]["code"], -32700);

    send(&mut socket, json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" })).await;
    let response = receive(&mut socket).await;
    assert_eq!(response["id"], 9);
    assert_eq!(response["result"], json!({}));
}
