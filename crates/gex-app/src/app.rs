//! Main application logic.
//!
//! Consumes contract batches from one streaming session, keeps the latest
//! quote per contract, re-aggregates on every batch and renders the top
//! strikes on a fixed cadence. Snapshots are optionally appended to daily
//! JSON Lines files.

use crate::book::ChainBook;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::render::render_report;
use gex_aggregator::{calculate_gex_at, filter_by_expiration, summarize};
use gex_core::{GammaSnapshot, MonotonicClock};
use gex_persistence::SnapshotWriter;
use gex_stream::{
    ContractBatch, SessionStats, StreamError, StreamSession, TokenFileAuth, WsTransport,
};
use gex_telemetry::Metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    ticker: String,
    book: ChainBook,
    clock: MonotonicClock,
    /// Last known underlying price; batches without one reuse it.
    spot: Option<f64>,
    latest: Option<GammaSnapshot>,
    writer: Option<SnapshotWriter>,
    /// Session counters already exported to Prometheus.
    last_stats: SessionStats,
    /// `latest` has not been saved yet.
    dirty: bool,
}

impl Application {
    /// Create a new application instance.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let writer = if config.persistence.enabled {
            let writer =
                SnapshotWriter::new(&config.persistence.data_dir, config.persistence.buffer_size)?;
            info!(data_dir = %config.persistence.data_dir.display(), "Snapshot persistence enabled");
            Some(writer)
        } else {
            None
        };

        Ok(Self {
            ticker: config.ticker.trim().to_uppercase(),
            config,
            book: ChainBook::new(),
            clock: MonotonicClock::new(),
            spot: None,
            latest: None,
            writer,
            last_stats: SessionStats::default(),
            dirty: false,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Most recent snapshot, if any batch has been aggregated.
    pub fn latest(&self) -> Option<&GammaSnapshot> {
        self.latest.as_ref()
    }

    pub fn book(&self) -> &ChainBook {
        &self.book
    }

    /// Connect to the configured endpoint and run until Ctrl+C or a fatal
    /// stream error.
    pub async fn run(&mut self) -> AppResult<()> {
        let auth = Arc::new(TokenFileAuth::new(&self.config.token_path));
        let transport = Arc::new(WsTransport::new(self.config.ws_url.clone()));
        info!(
            ticker = %self.ticker,
            ws_url = %self.config.ws_url,
            expiration = %self.config.display.expiration,
            "Starting stream"
        );
        let session = StreamSession::spawn(self.config.stream_config(), auth, transport);
        self.run_session(session, shutdown_signal()).await
    }

    /// Drive `session` until `shutdown` resolves or the session ends.
    ///
    /// A fatal stream error is returned after the session has been shut down
    /// and pending snapshots have been written.
    pub async fn run_session(
        &mut self,
        mut session: StreamSession,
        shutdown: impl Future<Output = ()>,
    ) -> AppResult<()> {
        tokio::pin!(shutdown);

        let mut render_tick = tokio::time::interval(self.config.refresh_interval());
        render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut save_tick = tokio::time::interval(self.config.save_interval());
        save_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let persist = self.writer.is_some();

        let outcome = loop {
            tokio::select! {
                batch = session.next_batch() => match batch {
                    Ok(batch) => {
                        if let Err(e) = self.handle_batch(batch) {
                            warn!(error = %e, "Failed to aggregate batch");
                        }
                    }
                    Err(StreamError::SessionClosed) => {
                        info!("Session closed");
                        break Ok(());
                    }
                    Err(e) => {
                        error!(error = %e, "Stream failed");
                        break Err(AppError::from(e));
                    }
                },

                _ = render_tick.tick() => {
                    self.record_session_metrics(&session);
                    self.render();
                }

                _ = save_tick.tick(), if persist => {
                    self.save_latest();
                    self.write_metrics_file();
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
            }
        };

        self.record_session_metrics(&session);
        session.shutdown().await;

        self.save_latest();
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.close() {
                error!(error = %e, "Failed to close snapshot writer");
            }
        }
        self.write_metrics_file();

        info!(
            ticker = %self.ticker,
            contracts = self.book.len(),
            frames = self.last_stats.frames_received,
            reconnects = self.last_stats.reconnects,
            "Shutting down"
        );
        outcome
    }

    /// Fold one batch into the book and re-aggregate.
    fn handle_batch(&mut self, batch: ContractBatch) -> AppResult<()> {
        let received_at = batch.received_at;
        let (contracts, spot) = batch.into_parts();

        if let Some(spot) = spot {
            self.spot = Some(spot);
            Metrics::spot_price(&self.ticker, spot);
        }

        let added = self.book.apply(contracts);
        let today = received_at.date_naive();
        let pruned = self.book.prune_expired(today);
        if pruned > 0 {
            debug!(pruned, "Pruned expired contracts");
        }

        let Some(spot) = self.spot else {
            debug!(contracts = self.book.len(), "No spot price yet, deferring aggregation");
            return Ok(());
        };

        let started = Instant::now();
        let selected =
            filter_by_expiration(&self.book.contracts(), self.config.display.expiration, today);
        let timestamp = self.clock.observe(received_at);
        let snapshot = calculate_gex_at(&self.ticker, &selected, spot, timestamp)?;
        Metrics::aggregation_latency(started.elapsed().as_secs_f64() * 1000.0);

        let summary = summarize(&snapshot);
        Metrics::snapshot(&self.ticker, snapshot.len(), summary.net_gex);
        debug!(
            added,
            contracts = selected.len(),
            levels = snapshot.len(),
            net_gex = summary.net_gex,
            "Snapshot updated"
        );

        self.latest = Some(snapshot);
        self.dirty = true;
        Ok(())
    }

    fn render(&self) {
        match &self.latest {
            Some(snapshot) => {
                let report = render_report(
                    snapshot,
                    self.config.display.top_n,
                    self.config.display.strikes_range_pct,
                );
                println!("{report}");
            }
            None if self.book.is_empty() => {
                debug!(ticker = %self.ticker, "Waiting for first contracts")
            }
            None => debug!(
                ticker = %self.ticker,
                contracts = self.book.len(),
                "Waiting for spot price"
            ),
        }
    }

    fn save_latest(&mut self) {
        if !self.dirty {
            return;
        }
        let (Some(writer), Some(snapshot)) = (self.writer.as_mut(), self.latest.as_ref()) else {
            return;
        };
        match writer.save(snapshot) {
            Ok(()) => self.dirty = false,
            Err(e) => error!(error = %e, "Failed to save snapshot"),
        }
    }

    fn write_metrics_file(&self) {
        if let Some(path) = &self.config.metrics_file {
            if let Err(e) = Metrics::write_textfile(path) {
                warn!(error = %e, path = %path.display(), "Failed to write metrics file");
            }
        }
    }

    /// Export session counters as deltas since the last call.
    fn record_session_metrics(&mut self, session: &StreamSession) {
        let stats = session.stats();
        let prev = &self.last_stats;
        Metrics::frames_received(stats.frames_received.saturating_sub(prev.frames_received));
        Metrics::batches_emitted(stats.batches_emitted.saturating_sub(prev.batches_emitted));
        Metrics::batches_dropped(stats.batches_dropped.saturating_sub(prev.batches_dropped));
        Metrics::parse_errors(stats.parse_errors.saturating_sub(prev.parse_errors));
        Metrics::contracts_dropped(stats.entries_dropped.saturating_sub(prev.entries_dropped));
        Metrics::reconnects(stats.reconnects.saturating_sub(prev.reconnects));
        Metrics::session_state_set(session.state().as_str());
        self.last_stats = stats;
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
