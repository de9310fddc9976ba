//! Mock WebSocket server for integration tests.
//!
//! Accepts connections, records the Authorization header and every text
//! message, and answers a subscribe request according to its behavior.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

/// How the server answers a subscribe request.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Ack, then send each message in order and stay open.
    Stream(Vec<String>),
    /// Reply on the error channel.
    Reject(String),
    /// Ack, then close the socket.
    CloseAfterAck,
}

#[derive(Default)]
struct Recorded {
    messages: Vec<String>,
    auth_headers: Vec<String>,
    connections: u32,
}

pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockWsServer {
    /// Start a new mock server on an available port.
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let recorded_clone = recorded.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            behavior.clone(),
                            recorded_clone.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            recorded,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connection_count(&self) -> u32 {
        self.recorded.lock().connections
    }

    pub fn received_messages(&self) -> Vec<String> {
        self.recorded.lock().messages.clone()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.recorded.lock().auth_headers.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: MockBehavior,
    recorded: Arc<Mutex<Recorded>>,
) {
    let header_sink = recorded.clone();
    let callback = move |req: &Request, resp: Response| {
        let header = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mut rec = header_sink.lock();
        rec.connections += 1;
        rec.auth_headers.push(header);
        Ok::<Response, ErrorResponse>(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                recorded.lock().messages.push(text.clone());

                let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                if parsed.get("method") != Some(&serde_json::json!("subscribe")) {
                    continue;
                }
                let subscription = parsed.get("subscription").cloned().unwrap_or_default();
                let ack = serde_json::json!({
                    "channel": "subscriptionResponse",
                    "data": {"method": "subscribe", "subscription": subscription}
                });

                match &behavior {
                    MockBehavior::Stream(messages) => {
                        let _ = write.send(Message::Text(ack.to_string())).await;
                        for m in messages {
                            let _ = write.send(Message::Text(m.clone())).await;
                        }
                    }
                    MockBehavior::Reject(reason) => {
                        let err = serde_json::json!({
                            "channel": "error",
                            "data": {"method": "subscribe", "message": reason}
                        });
                        let _ = write.send(Message::Text(err.to_string())).await;
                    }
                    MockBehavior::CloseAfterAck => {
                        let _ = write.send(Message::Text(ack.to_string())).await;
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}
