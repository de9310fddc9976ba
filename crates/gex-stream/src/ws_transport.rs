//! WebSocket implementation of [`Transport`].

use crate::auth::Credential;
use crate::error::{StreamError, StreamResult};
use crate::message::{
    ChannelMessage, WsRequest, CHANNEL_ERROR, CHANNEL_HEARTBEAT, CHANNEL_OPTION_CHAIN,
    CHANNEL_PONG, CHANNEL_QUOTE, CHANNEL_SUBSCRIPTION_REJECTED, CHANNEL_SUBSCRIPTION_RESPONSE,
};
use crate::transport::{BoxFuture, FrameSource, InboundFrame, Transport};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to a streaming endpoint with a bearer token.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self, credential: &Credential) -> StreamResult<WsStream> {
        info!(url = %self.url, "Connecting to WebSocket");

        let mut request = self.url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.token()))
            .map_err(|e| StreamError::Transport(format!("invalid credential header: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        // TCP_NODELAY: frames are small and latency-sensitive.
        let (ws_stream, _response) =
            connect_async_tls_with_config(request, None, true, None).await?;
        info!("WebSocket connected");
        Ok(ws_stream)
    }
}

impl Transport for WsTransport {
    fn connect<'a>(
        &'a self,
        credential: &'a Credential,
        _ticker: &'a str,
    ) -> BoxFuture<'a, StreamResult<Box<dyn FrameSource>>> {
        Box::pin(async move {
            let stream = self.open(credential).await?;
            Ok(Box::new(WsFrameSource { stream }) as Box<dyn FrameSource>)
        })
    }
}

/// One open WebSocket connection.
pub struct WsFrameSource {
    stream: WsStream,
}

impl FrameSource for WsFrameSource {
    fn send_subscribe<'a>(&'a mut self, ticker: &'a str) -> BoxFuture<'a, StreamResult<()>> {
        Box::pin(async move {
            let request = serde_json::to_string(&WsRequest::option_chain(ticker))?;
            debug!(ticker, "Sending subscription");
            self.stream.send(Message::Text(request)).await?;
            Ok(())
        })
    }

    fn next_frame(&mut self) -> BoxFuture<'_, StreamResult<Option<InboundFrame>>> {
        Box::pin(async move {
            loop {
                let msg = match self.stream.next().await {
                    Some(msg) => msg?,
                    None => return Ok(None),
                };
                match msg {
                    Message::Text(text) => {
                        if let Some(frame) = classify_text(&text) {
                            return Ok(Some(frame));
                        }
                    }
                    Message::Binary(bytes) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if let Some(frame) = classify_text(&text) {
                                return Ok(Some(frame));
                            }
                        }
                        Err(_) => {
                            warn!("Ignoring non-UTF-8 binary frame");
                        }
                    },
                    Message::Ping(data) => {
                        self.stream.send(Message::Pong(data)).await?;
                        return Ok(Some(InboundFrame::Heartbeat));
                    }
                    Message::Pong(_) => return Ok(Some(InboundFrame::Heartbeat)),
                    Message::Close(frame) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1005, String::new()));
                        info!(code, reason = %reason, "Server closed connection");
                        return Err(StreamError::ConnectionClosed { code, reason });
                    }
                    Message::Frame(_) => {}
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, StreamResult<()>> {
        Box::pin(async move {
            match self.stream.close(None).await {
                Ok(()) => Ok(()),
                Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
                | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Classify one text frame.
///
/// Channel-tagged messages are routed by channel; unhandled channels only
/// count as liveness. Untagged messages are passed through as a data payload
/// so the parser can decide. Text that is not JSON is passed through as a
/// string and rejected by the parser as invalid JSON. Returns `None` for
/// malformed channel envelopes.
pub fn classify_text(text: &str) -> Option<InboundFrame> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Some(InboundFrame::Data(Value::String(text.to_string()))),
    };

    let has_channel = value.get("channel").is_some_and(Value::is_string);
    if !has_channel {
        return Some(InboundFrame::Data(value));
    }

    let msg: ChannelMessage = match serde_json::from_value(value) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "Malformed channel message");
            return None;
        }
    };

    match msg.channel.as_str() {
        CHANNEL_PONG | CHANNEL_HEARTBEAT => Some(InboundFrame::Heartbeat),
        CHANNEL_SUBSCRIPTION_RESPONSE => Some(InboundFrame::SubscriptionAck),
        CHANNEL_SUBSCRIPTION_REJECTED => Some(InboundFrame::SubscriptionRejected(msg.reason())),
        CHANNEL_ERROR if msg.concerns_subscription() => {
            Some(InboundFrame::SubscriptionRejected(msg.reason()))
        }
        CHANNEL_ERROR => {
            warn!(reason = %msg.reason(), "Server reported error");
            Some(InboundFrame::Heartbeat)
        }
        CHANNEL_OPTION_CHAIN | CHANNEL_QUOTE => Some(InboundFrame::Data(msg.data)),
        other => {
            debug!(channel = other, "Ignoring message on unhandled channel");
            Some(InboundFrame::Heartbeat)
        }
    }
}
