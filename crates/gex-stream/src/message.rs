//! Wire envelopes for the streaming endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHANNEL_OPTION_CHAIN: &str = "optionChain";
pub const CHANNEL_QUOTE: &str = "quote";
pub const CHANNEL_PONG: &str = "pong";
pub const CHANNEL_HEARTBEAT: &str = "heartbeat";
pub const CHANNEL_SUBSCRIPTION_RESPONSE: &str = "subscriptionResponse";
pub const CHANNEL_SUBSCRIPTION_REJECTED: &str = "subscriptionRejected";
pub const CHANNEL_ERROR: &str = "error";

/// Channel-tagged server message (`{"channel": ..., "data": ...}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

impl ChannelMessage {
    /// Human-readable reason carried by an error or rejection message.
    pub fn reason(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("reason"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.data.to_string()),
            Value::Null => "no reason given".to_string(),
            other => other.to_string(),
        }
    }

    /// True when an `error` message refers to a subscribe request.
    pub fn concerns_subscription(&self) -> bool {
        self.data
            .get("method")
            .and_then(Value::as_str)
            .is_some_and(|m| m == "subscribe")
            || self.data.get("subscription").is_some()
    }
}

/// Outgoing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Value>,
}

impl WsRequest {
    pub fn subscribe(subscription: Value) -> Self {
        Self {
            method: "subscribe".to_string(),
            subscription: Some(subscription),
        }
    }

    /// Option-chain subscription for a single underlying.
    pub fn option_chain(ticker: &str) -> Self {
        Self::subscribe(serde_json::json!({
            "type": CHANNEL_OPTION_CHAIN,
            "ticker": ticker,
        }))
    }
}
