#![allow(clippy::unwrap_used, dead_code)]
// In-process fake hub speaking the Home Assistant WebSocket handshake.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use hassly_api::{HubClient, NoEcho, Timeouts};

/// How the fake hub answers the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBehavior {
    /// `auth_required`, then `auth_ok`.
    Accept,
    /// `auth_required`, then `auth_invalid`.
    Reject,
    /// A greeting other than `auth_required`, then `auth_ok`.
    BadGreeting,
    /// Upgrade the socket and never say anything.
    Silent,
}

type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

pub struct FakeHub {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    sessions: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeHub {
    /// Start a hub on a loopback port. `respond` sees every request after
    /// the handshake and returns the reply to send, if any.
    pub async fn start<F>(auth: AuthBehavior, respond: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(AtomicUsize::new(0));
        let respond: Responder = Arc::new(respond);

        let task = {
            let received = Arc::clone(&received);
            let connections = Arc::clone(&connections);
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                while let Ok((stream, _peer)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let received = Arc::clone(&received);
                    let sessions = Arc::clone(&sessions);
                    let respond = Arc::clone(&respond);
                    tokio::spawn(async move {
                        // Reachability probes connect and hang up without upgrading.
                        let Ok(ws) = accept_async(stream).await else {
                            return;
                        };
                        sessions.fetch_add(1, Ordering::SeqCst);
                        serve(ws, auth, &received, &respond).await;
                    });
                }
            })
        };

        Self {
            addr,
            received,
            connections,
            sessions,
            task,
        }
    }

    /// Base URL in the form users configure (`http://host:port`).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every frame received after the handshake, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Raw TCP connections accepted, including reachability probes.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Connections that completed the WebSocket upgrade.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl Drop for FakeHub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    auth: AuthBehavior,
    received: &Mutex<Vec<Value>>,
    respond: &Responder,
) {
    let greeting = match auth {
        AuthBehavior::Silent => {
            drain(&mut ws).await;
            return;
        }
        AuthBehavior::BadGreeting => json!({ "type": "hello" }),
        AuthBehavior::Accept | AuthBehavior::Reject => {
            json!({ "type": "auth_required", "ha_version": "2025.1.0" })
        }
    };
    if send_json(&mut ws, &greeting).await.is_err() {
        return;
    }

    let Some(auth_frame) = next_json(&mut ws).await else {
        return;
    };
    if auth_frame["type"] != "auth" {
        return;
    }

    let verdict = if auth == AuthBehavior::Reject {
        json!({ "type": "auth_invalid", "message": "Invalid access token or password" })
    } else {
        json!({ "type": "auth_ok", "ha_version": "2025.1.0" })
    };
    if send_json(&mut ws, &verdict).await.is_err() {
        return;
    }

    while let Some(request) = next_json(&mut ws).await {
        received.lock().unwrap().push(request.clone());
        if let Some(reply) = respond(&request) {
            if send_json(&mut ws, &reply).await.is_err() {
                return;
            }
        }
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: &Value) -> Result<(), ()> {
    ws.send(Message::text(value.to_string()))
        .await
        .map_err(|_| ())
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn drain(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(message)) = ws.next().await {
        if message.is_close() {
            return;
        }
    }
}

// ── Canned replies ──────────────────────────────────────────────────

pub fn state(entity_id: &str, friendly_name: Option<&str>) -> Value {
    let mut attributes = serde_json::Map::new();
    if let Some(name) = friendly_name {
        attributes.insert("friendly_name".into(), json!(name));
    }
    json!({
        "entity_id": entity_id,
        "state": "on",
        "attributes": attributes,
        "last_changed": "2025-01-01T00:00:00+00:00",
        "last_updated": "2025-01-01T00:00:00+00:00",
        "context": { "id": "01J0000000000000000000000" }
    })
}

pub fn result_ok(request: &Value, result: Value) -> Value {
    json!({ "id": request["id"], "type": "result", "success": true, "result": result })
}

pub fn result_err(request: &Value, message: &str) -> Value {
    json!({
        "id": request["id"],
        "type": "result",
        "success": false,
        "error": { "code": "unknown_error", "message": message }
    })
}

/// Answers every `get_states` with `states`; ignores everything else.
pub fn states_only(states: Vec<Value>) -> impl Fn(&Value) -> Option<Value> + Send + Sync + 'static {
    move |request| {
        (request["type"] == "get_states").then(|| result_ok(request, Value::Array(states.clone())))
    }
}

// ── Client helpers ──────────────────────────────────────────────────

pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        probe: Duration::from_secs(2),
        handshake: Duration::from_millis(500),
        close: Duration::from_millis(500),
    }
}

/// Client aimed at `hub` with the echo stage disabled.
pub fn client_for(hub: &FakeHub, token: &str) -> HubClient {
    HubClient::new(Some(&hub.url()), Some(token.to_owned().into()), false)
        .unwrap()
        .with_echo_probe(Arc::new(NoEcho))
        .with_timeouts(fast_timeouts())
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
