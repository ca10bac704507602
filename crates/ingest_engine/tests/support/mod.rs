#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}

/// Server side of one accepted WebSocket connection.
pub struct ServerSocket {
    ws: WebSocketStream<TcpStream>,
}

impl ServerSocket {
    pub async fn send_event(&mut self, event: &str, data: Value) -> bool {
        let frame = json!({ "event": event, "data": data }).to_string();
        self.send_raw(&frame).await
    }

    pub async fn send_raw(&mut self, text: &str) -> bool {
        self.ws.send(Message::Text(text.to_string().into())).await.is_ok()
    }

    /// Next `(event, data)` sent by the client; `None` once the client is gone.
    pub async fn next_event(&mut self) -> Option<(String, Value)> {
        while let Some(frame) = self.ws.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let value: Value = serde_json::from_str(text.as_str()).ok()?;
                    let event = value.get("event")?.as_str()?.to_string();
                    let data = value.get("data").cloned().unwrap_or(Value::Null);
                    return Some((event, data));
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Keeps the connection open until the client goes away.
    pub async fn hold(mut self) {
        while self.next_event().await.is_some() {}
    }
}

pub struct TestServer {
    pub url: String,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Starts a local WebSocket server; `script` runs once per accepted
/// connection with its zero-based index.
pub async fn start_server<F, Fut>(script: F) -> TestServer
where
    F: Fn(usize, ServerSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    let script = Arc::new(script);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let script = script.clone();
            tokio::spawn(async move {
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                    script(index, ServerSocket { ws }).await;
                }
            });
        }
    });

    TestServer {
        url: ws_url(addr),
        accepted,
    }
}

/// Address nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    ws_url(addr)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}

/// Polls `condition` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
