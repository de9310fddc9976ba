//! End-to-end pipeline tests: scripted stream in, snapshots out.

use gex_app::{AppConfig, AppError, Application};
use gex_stream::{
    AuthError, Authenticator, BoxFuture, Credential, FrameSource, InboundFrame, StreamConfig,
    StreamError, StreamResult, StreamSession, Transport,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct StaticAuth;

impl Authenticator for StaticAuth {
    fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        Box::pin(async { Ok(Credential::new("test-token", None)) })
    }

    fn refresh<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, Result<Credential, AuthError>> {
        Box::pin(async { Ok(Credential::new("test-token", None)) })
    }
}

/// Serves one connection that replays `frames`, then goes silent.
struct OneShotTransport {
    frames: Mutex<Option<Vec<InboundFrame>>>,
}

impl OneShotTransport {
    fn new(frames: Vec<InboundFrame>) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Some(frames)),
        })
    }
}

impl Transport for OneShotTransport {
    fn connect<'a>(
        &'a self,
        _credential: &'a Credential,
        _ticker: &'a str,
    ) -> BoxFuture<'a, StreamResult<Box<dyn FrameSource>>> {
        let frames = self.frames.lock().unwrap().take();
        Box::pin(async move {
            match frames {
                Some(frames) => Ok(Box::new(ReplaySource {
                    frames: frames.into(),
                }) as Box<dyn FrameSource>),
                None => Err(StreamError::Transport("no more connections".into())),
            }
        })
    }
}

struct ReplaySource {
    frames: VecDeque<InboundFrame>,
}

impl FrameSource for ReplaySource {
    fn send_subscribe<'a>(&'a mut self, _ticker: &'a str) -> BoxFuture<'a, StreamResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn next_frame(&mut self) -> BoxFuture<'_, StreamResult<Option<InboundFrame>>> {
        Box::pin(async move {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, StreamResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn chain(contracts: Value, spot: Option<f64>) -> InboundFrame {
    let mut message = json!({ "symbol": "SPY", "contracts": contracts });
    if let Some(spot) = spot {
        message["underlyingPrice"] = json!(spot);
    }
    InboundFrame::Data(message)
}

fn entry(strike: f64, put_call: &str) -> Value {
    json!({
        "strike": strike,
        "gamma": 0.05,
        "openInterest": 1000,
        "putCall": put_call,
        "expirationDate": "2099-12-31"
    })
}

fn test_config(data_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.display.refresh_interval_ms = 20;
    config.persistence.enabled = true;
    config.persistence.data_dir = data_dir.to_path_buf();
    config.persistence.save_interval_ms = 20;
    config.metrics_file = Some(data_dir.join("gex.prom"));
    config
}

fn stream_config() -> StreamConfig {
    StreamConfig {
        ticker: "SPY".to_string(),
        staleness_threshold_ms: 60_000,
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        reconnect_jitter_ms: 0,
        max_reconnect_attempts: 0,
        queue_capacity: 16,
    }
}

fn snapshot_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("gex_SPY_") && n.ends_with(".jsonl"))
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_rejection_ends_run_after_pending_batches() {
    let dir = tempfile::tempdir().unwrap();
    let transport = OneShotTransport::new(vec![
        chain(json!([entry(500.0, "CALL")]), Some(500.0)),
        // Partial update without spot; the earlier strike stays in the book.
        chain(json!([entry(495.0, "PUT")]), None),
        InboundFrame::SubscriptionRejected("entitlement revoked".into()),
    ]);
    let session = StreamSession::spawn(stream_config(), Arc::new(StaticAuth), transport);

    let mut app = Application::new(test_config(dir.path())).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        app.run_session(session, std::future::pending()),
    )
    .await
    .expect("run should end on rejection");

    match result {
        Err(AppError::Stream(e)) => {
            assert!(matches!(*e, StreamError::SubscriptionRejected { .. }));
        }
        other => panic!("expected stream error, got {other:?}"),
    }

    let latest = app.latest().unwrap();
    assert_eq!(latest.ticker, "SPY");
    assert_eq!(latest.spot_price, 500.0);
    assert_eq!(latest.len(), 2);
    assert!(latest.level(500.0).unwrap().call_gex() > 0.0);
    assert!(latest.level(495.0).unwrap().put_gex() < 0.0);

    // The final snapshot is flushed on the way out.
    let files = snapshot_files(dir.path());
    assert_eq!(files.len(), 1);
    let records = gex_persistence::read_snapshots(&files[0]).unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.levels.len(), 2);
    assert_eq!(last.spot_price, 500.0);

    let metrics = std::fs::read_to_string(dir.path().join("gex.prom")).unwrap();
    assert!(metrics.contains("gex_net_exposure"));
}

#[tokio::test]
async fn test_shutdown_signal_stops_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let transport = OneShotTransport::new(vec![
        InboundFrame::SubscriptionAck,
        chain(json!([entry(500.0, "CALL"), entry(500.0, "PUT")]), Some(501.0)),
    ]);
    let session = StreamSession::spawn(stream_config(), Arc::new(StaticAuth), transport);

    let mut app = Application::new(test_config(dir.path())).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        app.run_session(session, tokio::time::sleep(Duration::from_millis(200))),
    )
    .await
    .expect("run should end on shutdown");

    assert!(result.is_ok());
    let latest = app.latest().unwrap();
    assert_eq!(latest.len(), 1);
    // Equal call and put exposure at one strike nets to zero.
    assert_eq!(latest.level(500.0).unwrap().total_gex(), 0.0);
    assert_eq!(snapshot_files(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_no_spot_means_no_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let transport = OneShotTransport::new(vec![chain(json!([entry(500.0, "CALL")]), None)]);
    let session = StreamSession::spawn(stream_config(), Arc::new(StaticAuth), transport);

    let mut app = Application::new(test_config(dir.path())).unwrap();
    app.run_session(session, tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap();

    assert!(app.latest().is_none());
    assert_eq!(app.book().len(), 1);
    assert!(snapshot_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_symbol_keyed_quote_supplies_spot() {
    let dir = tempfile::tempdir().unwrap();
    let transport = OneShotTransport::new(vec![
        chain(json!([entry(500.0, "CALL")]), None),
        InboundFrame::Data(json!({
            "SPY": {"quote": {"lastPrice": 0}, "extended": {"lastPrice": 502.0}}
        })),
    ]);
    let session = StreamSession::spawn(stream_config(), Arc::new(StaticAuth), transport);

    let mut app = Application::new(test_config(dir.path())).unwrap();
    app.run_session(session, tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap();

    let latest = app.latest().unwrap();
    assert_eq!(latest.spot_price, 502.0);
    assert_eq!(latest.len(), 1);
}
