//! Loopback plugin runtime peers for executor tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use sandcrate_exec_transport::Endpoint;

pub type PeerSocket = WebSocketStream<TcpStream>;

/// Commands received by a fake runtime, in arrival order.
#[derive(Clone, Default)]
pub struct Received(Arc<Mutex<Vec<Value>>>);

impl Received {
    pub fn commands(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, value: Value) {
        self.0.lock().unwrap().push(value);
    }
}

/// Accept exactly one connection and hand it to `script`.
pub async fn spawn_scripted_peer<F, Fut>(script: F) -> Endpoint
where
    F: FnOnce(PeerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        script(ws).await;
    });

    Endpoint::new(&format!("ws://{addr}/ws/plugins")).unwrap()
}

/// A runtime that behaves like the plugin backend, driven by parameters:
///
/// - `lines`: array of output lines sent as `update` envelopes
/// - `fail`: when set, the run ends with `result{success:false, error}`
/// - `final`: final output of a successful run (default `"done"`)
/// - `hang`: when true, no `result` is ever sent
pub async fn spawn_fake_runtime() -> (Endpoint, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Received::default();
    let record = received.clone();

    tokio::spawn(async move {
        let mut session_counter = 0u32;
        while let Ok((tcp, _)) = listener.accept().await {
            let record = record.clone();
            session_counter += 1;
            let session_base = session_counter * 100;
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                run_fake_connection(&mut ws, record, session_base).await;
            });
        }
    });

    (
        Endpoint::new(&format!("ws://{addr}/ws/plugins")).unwrap(),
        received,
    )
}

async fn run_fake_connection(ws: &mut PeerSocket, record: Received, session_base: u32) {
    if send_json(
        ws,
        json!({"type": "connected", "message": "WebSocket connected successfully"}),
    )
    .await
    .is_err()
    {
        return;
    }

    let mut runs = 0u32;
    while let Some(Ok(frame)) = ws.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(data) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        record.push(data.clone());

        let replies = match data["command"].as_str() {
            Some("execute_plugin") => {
                runs += 1;
                execute_replies(&data, format!("session-{}", session_base + runs))
            }
            Some("subscribe") => vec![json!({
                "type": "subscribed",
                "session_id": data["session_id"],
                "message": "Subscribed to session updates"
            })],
            other => vec![json!({
                "type": "error",
                "message": format!("Unknown command: {}", other.unwrap_or(""))
            })],
        };

        for reply in replies {
            if send_json(ws, reply).await.is_err() {
                return;
            }
        }
    }
}

fn execute_replies(data: &Value, session_id: String) -> Vec<Value> {
    let params = &data["parameters"];
    let mut replies = vec![json!({
        "type": "status",
        "session_id": session_id,
        "plugin_id": data["plugin_id"],
        "status": "starting",
        "message": "Plugin execution started"
    })];

    if let Some(lines) = params["lines"].as_array() {
        for line in lines {
            replies.push(json!({
                "type": "update",
                "session_id": session_id,
                "status": "running",
                "output": line
            }));
        }
    }

    if params["hang"].as_bool() == Some(true) {
        return replies;
    }

    let result = match params["fail"].as_str() {
        Some(error) => json!({
            "type": "result",
            "session_id": session_id,
            "status": "error",
            "success": false,
            "error": error
        }),
        None => json!({
            "type": "result",
            "session_id": session_id,
            "status": "completed",
            "success": true,
            "output": params["final"].as_str().unwrap_or("done")
        }),
    };
    replies.push(result);
    replies
}

pub async fn send_json(
    ws: &mut PeerSocket,
    value: Value,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    ws.send(Message::Text(value.to_string())).await
}

/// Read frames until the client goes away; returns the text frames seen.
pub async fn drain_until_closed(ws: &mut PeerSocket) -> Vec<String> {
    let mut texts = Vec::new();
    while let Some(Ok(frame)) = ws.next().await {
        match frame {
            Message::Text(text) => texts.push(text),
            Message::Close(_) => break,
            _ => {}
        }
    }
    texts
}
