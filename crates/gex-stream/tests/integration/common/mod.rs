#![allow(dead_code)]

pub mod mock_ws;
pub mod scripted;

use gex_stream::StreamConfig;
use serde_json::{json, Value};

/// Fast, deterministic session settings for tests.
pub fn fast_config() -> StreamConfig {
    StreamConfig {
        ticker: "SPY".to_string(),
        staleness_threshold_ms: 500,
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        reconnect_jitter_ms: 0,
        max_reconnect_attempts: 0,
        queue_capacity: 16,
    }
}

/// One-contract SPY chain message.
pub fn chain_message(strike: f64, spot: f64) -> Value {
    json!({
        "symbol": "SPY",
        "underlyingPrice": spot,
        "contracts": [{
            "strike": strike,
            "gamma": 0.05,
            "openInterest": 1000,
            "putCall": "CALL",
            "expirationDate": "2026-10-16"
        }]
    })
}
