//! Streaming session: the connect / subscribe / stream / reconnect loop.
//!
//! A session runs its retry loop on a background task and hands parsed
//! batches to a single consumer through a bounded drop-oldest queue.
//! Transient failures (dropped sockets, stale connections, retryable auth
//! errors) are absorbed by reconnecting with backoff and are never surfaced
//! to the consumer. Fatal failures end the session: queued batches are
//! delivered, then the error once, then `SessionClosed`.

use crate::auth::Credential;
use crate::backoff::Backoff;
use crate::error::{StreamError, StreamResult};
use crate::queue::BatchQueue;
use crate::transport::{Authenticator, FrameSource, InboundFrame, Transport};
use crate::watchdog::StalenessWatchdog;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use gex_core::OptionContract;
use gex_feed::{ContractParser, ParsedMessage};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const TRANSITION_HISTORY: usize = 64;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub ticker: String,
    /// No frame for this long means the connection is dead.
    pub staleness_threshold_ms: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// Upper bound of the random delay added to each backoff.
    pub reconnect_jitter_ms: u64,
    /// Consecutive failed attempts tolerated before giving up (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Undelivered batches kept before the oldest is dropped.
    pub queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ticker: "SPY".to_string(),
            staleness_threshold_ms: 30_000,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 60_000,
            reconnect_jitter_ms: 1_000,
            max_reconnect_attempts: 0,
            queue_capacity: 16,
        }
    }
}

impl StreamConfig {
    pub fn for_ticker(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold_ms)
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(
            self.reconnect_base_delay_ms,
            self.reconnect_max_delay_ms,
            self.reconnect_jitter_ms,
        )
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    Stale,
    Reconnecting,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Streaming => "streaming",
            Self::Stale => "stale",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Numeric code for the state gauge.
    pub fn code(&self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Subscribed => 2,
            Self::Streaming => 3,
            Self::Stale => 4,
            Self::Reconnecting => 5,
            Self::Closed => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub at: DateTime<Utc>,
}

/// One emission: the contracts and spot price carried by one inbound message.
#[derive(Debug, Clone)]
pub struct ContractBatch {
    pub contracts: Vec<OptionContract>,
    pub spot_price: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl ContractBatch {
    pub fn into_parts(self) -> (Vec<OptionContract>, Option<f64>) {
        (self.contracts, self.spot_price)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_received: u64,
    pub batches_emitted: u64,
    pub batches_dropped: u64,
    pub parse_errors: u64,
    pub entries_dropped: u64,
    pub connects: u64,
    pub reconnects: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    batches_emitted: AtomicU64,
    batches_dropped: AtomicU64,
    parse_errors: AtomicU64,
    entries_dropped: AtomicU64,
    connects: AtomicU64,
    reconnects: AtomicU64,
}

/// State visible to both the consumer handle and the producer task.
struct Shared {
    ticker: String,
    state: RwLock<SessionState>,
    transitions: Mutex<VecDeque<StateTransition>>,
    queue: BatchQueue<ContractBatch>,
    counters: Counters,
    last_frame_at: RwLock<Option<DateTime<Utc>>>,
    shutdown: CancellationToken,
}

impl Shared {
    /// Closed is absorbing: once set, later transitions are ignored.
    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        let prev = *state;
        if prev == next || prev.is_terminal() {
            return;
        }
        *state = next;
        drop(state);

        let mut history = self.transitions.lock();
        if history.len() >= TRANSITION_HISTORY {
            history.pop_front();
        }
        history.push_back(StateTransition {
            from: prev,
            to: next,
            at: Utc::now(),
        });
        drop(history);

        info!(ticker = %self.ticker, from = %prev, to = %next, "Session state changed");
    }

    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn record_frame(&self) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        *self.last_frame_at.write() = Some(Utc::now());
    }
}

/// Consumer handle for one ticker's stream.
///
/// Dropping the handle cancels the background task.
pub struct StreamSession {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl StreamSession {
    /// Start the session on the current tokio runtime.
    pub fn spawn(
        config: StreamConfig,
        auth: Arc<dyn Authenticator>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let shared = Arc::new(Shared {
            ticker: config.ticker.trim().to_uppercase(),
            state: RwLock::new(SessionState::Disconnected),
            transitions: Mutex::new(VecDeque::new()),
            queue: BatchQueue::new(config.queue_capacity),
            counters: Counters::default(),
            last_frame_at: RwLock::new(None),
            shutdown: CancellationToken::new(),
        });

        let driver = SessionDriver {
            backoff: config.backoff(),
            config,
            auth,
            transport,
            parser: ContractParser::new(),
            shared: shared.clone(),
        };
        let task = tokio::spawn(driver.run());

        Self {
            shared,
            task: Some(task),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.shared.ticker
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Recent state transitions, oldest first.
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.shared.transitions.lock().iter().copied().collect()
    }

    pub fn stats(&self) -> SessionStats {
        let c = &self.shared.counters;
        SessionStats {
            frames_received: c.frames_received.load(Ordering::Relaxed),
            batches_emitted: c.batches_emitted.load(Ordering::Relaxed),
            batches_dropped: c.batches_dropped.load(Ordering::Relaxed),
            parse_errors: c.parse_errors.load(Ordering::Relaxed),
            entries_dropped: c.entries_dropped.load(Ordering::Relaxed),
            connects: c.connects.load(Ordering::Relaxed),
            reconnects: c.reconnects.load(Ordering::Relaxed),
            last_frame_at: *self.shared.last_frame_at.read(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait for the next batch.
    ///
    /// Reconnects are invisible here. Fails only with a fatal error (once)
    /// and with `SessionClosed` after that or after [`close`](Self::close).
    pub async fn next_batch(&mut self) -> StreamResult<ContractBatch> {
        self.shared.queue.pop().await
    }

    /// Close the session. Takes effect immediately from the consumer's point
    /// of view; the background task releases the connection on its own.
    pub fn close(&self) {
        let was_closed = self.state().is_terminal();
        self.shared.set_state(SessionState::Closed);
        self.shared.queue.close();
        self.shared.shutdown.cancel();
        if !was_closed {
            info!(ticker = %self.shared.ticker, "Session closed by consumer");
        }
    }

    /// Close and wait for the background task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
    }

    /// Consume the session as a stream of batches.
    ///
    /// The stream yields a fatal error at most once and ends when the
    /// session is closed.
    pub fn into_stream(self) -> impl Stream<Item = StreamResult<ContractBatch>> {
        futures_util::stream::unfold(self, |mut session| async move {
            match session.next_batch().await {
                Err(StreamError::SessionClosed) => None,
                other => Some((other, session)),
            }
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Why the read loop on one connection stopped.
enum PumpExit {
    Cancelled,
    Rejected(String),
    Stale { streamed: bool },
    Ended { streamed: bool },
    Failed { error: StreamError, streamed: bool },
}

/// Producer side: owns the retry loop.
struct SessionDriver {
    config: StreamConfig,
    backoff: Backoff,
    auth: Arc<dyn Authenticator>,
    transport: Arc<dyn Transport>,
    parser: ContractParser,
    shared: Arc<Shared>,
}

impl SessionDriver {
    async fn run(self) {
        match self.drive().await {
            Ok(()) => {
                debug!(ticker = %self.shared.ticker, "Session task stopped");
            }
            Err(e) => {
                error!(ticker = %self.shared.ticker, error = %e, "Session terminated");
                self.shared.set_state(SessionState::Closed);
                self.shared.queue.fail(e);
            }
        }
        self.shared.set_state(SessionState::Closed);
    }

    fn is_cancelled(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Run `fut` unless shutdown fires first.
    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.shared.shutdown.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Count a failed attempt and sleep before the next one.
    ///
    /// Returns `Ok(false)` if shutdown fired during the wait.
    async fn retry_after(&self, attempt: &mut u32, reason: &str) -> StreamResult<bool> {
        *attempt += 1;
        let max = self.config.max_reconnect_attempts;
        if max > 0 && *attempt > max {
            error!(ticker = %self.shared.ticker, attempt = *attempt, "Max reconnection attempts reached");
            return Err(StreamError::ReconnectExhausted(max));
        }

        self.shared.set_state(SessionState::Reconnecting);
        self.shared.counters.reconnects.fetch_add(1, Ordering::Relaxed);

        let delay = self.backoff.delay(*attempt);
        warn!(
            ticker = %self.shared.ticker,
            attempt = *attempt,
            delay_ms = delay.as_millis() as u64,
            reason,
            "Reconnecting"
        );
        Ok(self.cancellable(tokio::time::sleep(delay)).await.is_some())
    }

    async fn drive(&self) -> StreamResult<()> {
        let ticker = self.shared.ticker.clone();
        let mut credential: Option<Credential> = None;
        let mut attempt = 0u32;

        loop {
            if self.is_cancelled() {
                return Ok(());
            }
            self.shared.set_state(SessionState::Connecting);

            let auth_result = match credential.take() {
                Some(prev) => self.cancellable(self.auth.refresh(&prev)).await,
                None => self.cancellable(self.auth.authenticate()).await,
            };
            let cred = match auth_result {
                None => return Ok(()),
                Some(Ok(cred)) => cred,
                Some(Err(e)) if e.permanent => return Err(e.into()),
                Some(Err(e)) => {
                    warn!(ticker = %ticker, error = %e, "Authentication failed, will retry");
                    if !self.retry_after(&mut attempt, "auth").await? {
                        return Ok(());
                    }
                    continue;
                }
            };

            info!(ticker = %ticker, "Connecting to stream");
            let connected = self.cancellable(self.transport.connect(&cred, &ticker)).await;
            credential = Some(cred);
            let mut source = match connected {
                None => return Ok(()),
                Some(Ok(source)) => source,
                Some(Err(e)) if e.is_fatal() => return Err(e),
                Some(Err(e)) => {
                    warn!(ticker = %ticker, error = %e, "Connect failed");
                    if !self.retry_after(&mut attempt, "connect").await? {
                        return Ok(());
                    }
                    continue;
                }
            };
            self.shared.counters.connects.fetch_add(1, Ordering::Relaxed);

            // Subscriptions are per connection and re-sent after every reconnect.
            match self.cancellable(source.send_subscribe(&ticker)).await {
                None => {
                    release(source.as_mut()).await;
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(ticker = %ticker, error = %e, "Subscribe failed");
                    release(source.as_mut()).await;
                    if !self.retry_after(&mut attempt, "subscribe").await? {
                        return Ok(());
                    }
                    continue;
                }
                Some(Ok(())) => {}
            }
            self.shared.set_state(SessionState::Subscribed);
            info!(ticker = %ticker, "Subscription sent");

            let exit = self.pump(source.as_mut()).await;
            // Stale is observable while the dead connection is torn down.
            if matches!(exit, PumpExit::Stale { streamed: true }) {
                self.shared.set_state(SessionState::Stale);
            }
            release(source.as_mut()).await;

            let (reason, streamed) = match exit {
                PumpExit::Cancelled => return Ok(()),
                PumpExit::Rejected(reason) => {
                    return Err(StreamError::SubscriptionRejected { ticker, reason });
                }
                PumpExit::Stale { streamed } => {
                    warn!(
                        ticker = %ticker,
                        threshold_ms = self.config.staleness_threshold_ms,
                        "No frames within staleness threshold"
                    );
                    ("stale", streamed)
                }
                PumpExit::Ended { streamed } => {
                    info!(ticker = %ticker, "Stream ended by server");
                    ("ended", streamed)
                }
                PumpExit::Failed { error, streamed } => {
                    if error.is_fatal() {
                        return Err(error);
                    }
                    warn!(ticker = %ticker, error = %error, "Stream error");
                    ("error", streamed)
                }
            };

            // A connection that delivered data resets the backoff.
            if streamed {
                attempt = 0;
            }
            if !self.retry_after(&mut attempt, reason).await? {
                return Ok(());
            }
        }
    }

    /// Read frames until the connection fails, goes stale, or shutdown fires.
    async fn pump(&self, source: &mut dyn FrameSource) -> PumpExit {
        let mut watchdog = StalenessWatchdog::new(self.config.staleness_threshold());
        let mut streamed = false;

        loop {
            let frame = tokio::select! {
                biased;
                () = self.shared.shutdown.cancelled() => return PumpExit::Cancelled,
                () = watchdog.expired() => return PumpExit::Stale { streamed },
                frame = source.next_frame() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => return PumpExit::Ended { streamed },
                Err(error) => return PumpExit::Failed { error, streamed },
            };

            watchdog.record_frame();
            self.shared.record_frame();

            match frame {
                InboundFrame::Data(payload) => {
                    // Text frames the transport could not decode arrive as strings.
                    let result = match &payload {
                        serde_json::Value::String(text) => {
                            self.parser.parse_text(text, &self.shared.ticker)
                        }
                        other => self.parser.parse(other, &self.shared.ticker),
                    };
                    match result {
                        Ok(parsed) => {
                            if !streamed {
                                streamed = true;
                                self.shared.set_state(SessionState::Streaming);
                            }
                            self.emit(parsed);
                        }
                        Err(e) => {
                            self.shared.counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                            warn!(ticker = %self.shared.ticker, error = %e, "Skipping unparseable message");
                        }
                    }
                }
                InboundFrame::Heartbeat => {}
                InboundFrame::SubscriptionAck => {
                    debug!(ticker = %self.shared.ticker, "Subscription acknowledged");
                }
                InboundFrame::SubscriptionRejected(reason) => {
                    return PumpExit::Rejected(reason);
                }
            }
        }
    }

    fn emit(&self, parsed: ParsedMessage) {
        let counters = &self.shared.counters;
        if parsed.dropped > 0 {
            counters
                .entries_dropped
                .fetch_add(parsed.dropped as u64, Ordering::Relaxed);
        }

        let batch = ContractBatch {
            contracts: parsed.contracts,
            spot_price: parsed.spot_price,
            received_at: Utc::now(),
        };
        if self.shared.queue.push(batch) {
            counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(ticker = %self.shared.ticker, "Consumer lagging, dropped oldest batch");
        }
        counters.batches_emitted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Best-effort close; errors and hangs are logged and ignored.
async fn release(source: &mut dyn FrameSource) {
    match tokio::time::timeout(CLOSE_TIMEOUT, source.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Error closing connection"),
        Err(_) => debug!("Timed out closing connection"),
    }
}
