//! Prometheus metrics for the GEX stream.
//!
//! Covers:
//! - Session state and connection churn
//! - Frame and batch throughput, parse failures
//! - Latest snapshot: spot, level count, net exposure
//! - Aggregation latency
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which should crash at startup. These panics
//! only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntGaugeVec, TextEncoder,
};
use std::path::Path;

const SESSION_STATES: &[&str] = &[
    "disconnected",
    "connecting",
    "subscribed",
    "streaming",
    "stale",
    "reconnecting",
    "closed",
];

/// Session state machine current state (one-hot).
pub static SESSION_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "gex_session_state",
        "Streaming session current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

pub static RECONNECTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("gex_reconnects_total", "Total reconnection attempts").unwrap()
});

pub static FRAMES_RECEIVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gex_frames_received_total",
        "Total inbound frames, data and heartbeat"
    )
    .unwrap()
});

pub static BATCHES_EMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gex_batches_emitted_total",
        "Total contract batches handed to the consumer queue"
    )
    .unwrap()
});

/// Batches evicted because the consumer lagged.
pub static BATCHES_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gex_batches_dropped_total",
        "Total batches dropped by the drop-oldest queue"
    )
    .unwrap()
});

pub static PARSE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gex_parse_errors_total",
        "Total inbound messages skipped as unparseable"
    )
    .unwrap()
});

pub static CONTRACTS_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gex_contracts_dropped_total",
        "Total contract entries dropped as noise"
    )
    .unwrap()
});

pub static SPOT_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("gex_spot_price", "Last known underlying price", &["ticker"]).unwrap()
});

pub static LEVEL_COUNT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "gex_level_count",
        "Strike levels in the latest snapshot",
        &["ticker"]
    )
    .unwrap()
});

pub static NET_GEX: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gex_net_exposure",
        "Net gamma exposure across all strikes in the latest snapshot",
        &["ticker"]
    )
    .unwrap()
});

/// Time to fold one batch into a snapshot.
pub static AGGREGATION_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "gex_aggregation_latency_ms",
        "Snapshot aggregation latency in milliseconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Set the session state. Only the active state is 1.
    pub fn session_state_set(state: &str) {
        for s in SESSION_STATES {
            SESSION_STATE.with_label_values(&[s]).set(0);
        }
        SESSION_STATE.with_label_values(&[state]).set(1);
    }

    pub fn reconnects(n: u64) {
        RECONNECTS_TOTAL.inc_by(n);
    }

    pub fn frames_received(n: u64) {
        FRAMES_RECEIVED_TOTAL.inc_by(n);
    }

    pub fn batches_emitted(n: u64) {
        BATCHES_EMITTED_TOTAL.inc_by(n);
    }

    pub fn batches_dropped(n: u64) {
        BATCHES_DROPPED_TOTAL.inc_by(n);
    }

    pub fn parse_errors(n: u64) {
        PARSE_ERRORS_TOTAL.inc_by(n);
    }

    pub fn contracts_dropped(n: u64) {
        CONTRACTS_DROPPED_TOTAL.inc_by(n);
    }

    pub fn spot_price(ticker: &str, price: f64) {
        SPOT_PRICE.with_label_values(&[ticker]).set(price);
    }

    /// Record the shape of a freshly aggregated snapshot.
    pub fn snapshot(ticker: &str, levels: usize, net_gex: f64) {
        LEVEL_COUNT
            .with_label_values(&[ticker])
            .set(i64::try_from(levels).unwrap_or(i64::MAX));
        NET_GEX.with_label_values(&[ticker]).set(net_gex);
    }

    pub fn aggregation_latency(latency_ms: f64) {
        AGGREGATION_LATENCY_MS.observe(latency_ms);
    }

    /// Encode the default registry in Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the text exposition atomically (temp file, then rename) so a
    /// textfile collector never reads a partial file.
    pub fn write_textfile(path: &Path) -> TelemetryResult<()> {
        let text = Self::encode_text()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_is_one_hot() {
        Metrics::session_state_set("streaming");
        Metrics::session_state_set("stale");
        assert_eq!(SESSION_STATE.with_label_values(&["stale"]).get(), 1);
        assert_eq!(SESSION_STATE.with_label_values(&["streaming"]).get(), 0);
        assert_eq!(SESSION_STATE.with_label_values(&["connecting"]).get(), 0);
    }

    #[test]
    fn test_snapshot_gauges() {
        Metrics::snapshot("TEST", 42, -1.5e9);
        assert_eq!(LEVEL_COUNT.with_label_values(&["TEST"]).get(), 42);
        assert_eq!(NET_GEX.with_label_values(&["TEST"]).get(), -1.5e9);
    }

    #[test]
    fn test_textfile_contains_registered_metrics() {
        Metrics::batches_emitted(3);
        Metrics::spot_price("TEXTFILE", 502.0);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gex.prom");
        Metrics::write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("gex_batches_emitted_total"));
        assert!(text.contains("gex_spot_price{ticker=\"TEXTFILE\"} 502"));
        assert!(!dir.path().join("gex.prom.tmp").exists());
    }
}
