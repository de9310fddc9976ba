//! Application configuration.

use crate::error::{AppError, AppResult};
use gex_aggregator::ExpirationFilter;
use gex_stream::StreamConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stream session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// No frame for this long forces a reconnect (ms).
    #[serde(default = "default_staleness_threshold_ms")]
    pub staleness_threshold_ms: u64,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_reconnect_jitter_ms")]
    pub reconnect_jitter_ms: u64,
    /// Maximum consecutive reconnect attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Undelivered batches kept before the oldest is dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_staleness_threshold_ms() -> u64 {
    30_000
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_reconnect_jitter_ms() -> u64 {
    1_000
}

fn default_queue_capacity() -> usize {
    16
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            staleness_threshold_ms: default_staleness_threshold_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_jitter_ms: default_reconnect_jitter_ms(),
            max_reconnect_attempts: 0,
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Console output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Table refresh cadence (ms).
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Strikes shown, ranked by absolute exposure.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Keep strikes within this percentage of spot.
    #[serde(default = "default_strikes_range_pct")]
    pub strikes_range_pct: f64,
    #[serde(default)]
    pub expiration: ExpirationFilter,
}

fn default_refresh_interval_ms() -> u64 {
    5_000
}

fn default_top_n() -> usize {
    10
}

fn default_strikes_range_pct() -> f64 {
    20.0
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            top_n: default_top_n(),
            strikes_range_pct: default_strikes_range_pct(),
            expiration: ExpirationFilter::default(),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Save cadence (ms).
    #[serde(default = "default_save_interval_ms")]
    pub save_interval_ms: u64,
    /// Snapshots buffered before writing to disk.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_save_interval_ms() -> u64 {
    60_000
}

fn default_buffer_size() -> usize {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            data_dir: default_data_dir(),
            save_interval_ms: default_save_interval_ms(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Underlying to stream.
    #[serde(default = "default_ticker")]
    pub ticker: String,
    /// Streaming endpoint.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// JSON token file maintained by the OAuth helper.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Log filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: Option<String>,
    /// Prometheus textfile written on every save tick and at shutdown.
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_ticker() -> String {
    "SPY".to_string()
}

fn default_ws_url() -> String {
    "wss://localhost:8443/stream".to_string()
}

fn default_token_path() -> PathBuf {
    PathBuf::from("tokens.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            ws_url: default_ws_url(),
            token_path: default_token_path(),
            log_level: None,
            metrics_file: None,
            stream: StreamSettings::default(),
            display: DisplayConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply command-line overrides on top of the file.
    pub fn apply_overrides(
        &mut self,
        ticker: Option<String>,
        expiration: Option<ExpirationFilter>,
        top_n: Option<usize>,
    ) {
        if let Some(ticker) = ticker {
            self.ticker = ticker;
        }
        if let Some(expiration) = expiration {
            self.display.expiration = expiration;
        }
        if let Some(top_n) = top_n {
            self.display.top_n = top_n;
        }
    }

    /// Reject settings the session or renderer cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let ticker = self.ticker.trim();
        if ticker.is_empty() {
            return Err(AppError::Config("ticker must not be empty".into()));
        }
        if !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '/' | '$' | '_'))
        {
            return Err(AppError::Config(format!("invalid ticker: {ticker:?}")));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "ws_url must use ws:// or wss://, got {:?}",
                self.ws_url
            )));
        }

        let s = &self.stream;
        if s.staleness_threshold_ms == 0 {
            return Err(AppError::Config("stream.staleness_threshold_ms must be > 0".into()));
        }
        if s.reconnect_base_delay_ms > s.reconnect_max_delay_ms {
            return Err(AppError::Config(
                "stream.reconnect_base_delay_ms must not exceed reconnect_max_delay_ms".into(),
            ));
        }
        if s.queue_capacity == 0 {
            return Err(AppError::Config("stream.queue_capacity must be > 0".into()));
        }

        let d = &self.display;
        if d.refresh_interval_ms == 0 {
            return Err(AppError::Config("display.refresh_interval_ms must be > 0".into()));
        }
        if d.top_n == 0 {
            return Err(AppError::Config("display.top_n must be > 0".into()));
        }
        if !d.strikes_range_pct.is_finite() || d.strikes_range_pct < 0.0 {
            return Err(AppError::Config(
                "display.strikes_range_pct must be a non-negative number".into(),
            ));
        }

        if self.persistence.enabled && self.persistence.save_interval_ms == 0 {
            return Err(AppError::Config("persistence.save_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Session settings for the configured ticker.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            ticker: self.ticker.trim().to_uppercase(),
            staleness_threshold_ms: self.stream.staleness_threshold_ms,
            reconnect_base_delay_ms: self.stream.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.stream.reconnect_max_delay_ms,
            reconnect_jitter_ms: self.stream.reconnect_jitter_ms,
            max_reconnect_attempts: self.stream.max_reconnect_attempts,
            queue_capacity: self.stream.queue_capacity,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.display.refresh_interval_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.persistence.save_interval_ms.max(1))
    }
}
