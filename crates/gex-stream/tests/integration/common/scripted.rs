//! In-memory collaborators that replay a fixed script.

use gex_stream::{
    AuthError, Authenticator, BoxFuture, Credential, FrameSource, InboundFrame, StreamError,
    StreamResult, Transport,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One step of a scripted connection.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(InboundFrame),
    Delay(Duration),
    End,
    Fail(String),
    /// Go silent without closing.
    Hang,
}

/// Outcome of one connect call.
#[derive(Debug, Clone)]
pub enum Plan {
    Refuse(String),
    Open(Vec<Step>),
    /// Connect never completes.
    Stall,
}

pub fn data(value: serde_json::Value) -> Step {
    Step::Frame(InboundFrame::Data(value))
}

pub struct ScriptedTransport {
    plans: Mutex<VecDeque<Plan>>,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    close_delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(plans: Vec<Plan>) -> Arc<Self> {
        Self::build(plans, None)
    }

    /// Every connection takes `delay` to close.
    pub fn with_close_delay(plans: Vec<Plan>, delay: Duration) -> Arc<Self> {
        Self::build(plans, Some(delay))
    }

    fn build(plans: Vec<Plan>, close_delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into()),
            connects: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            close_delay,
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn connect<'a>(
        &'a self,
        _credential: &'a Credential,
        _ticker: &'a str,
    ) -> BoxFuture<'a, StreamResult<Box<dyn FrameSource>>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let plan = self.plans.lock().pop_front().unwrap_or(Plan::Stall);
            match plan {
                Plan::Refuse(reason) => Err(StreamError::Transport(reason)),
                Plan::Open(steps) => Ok(Box::new(ScriptedSource {
                    steps: steps.into(),
                    closes: self.closes.clone(),
                    subscriptions: self.subscriptions.clone(),
                    close_delay: self.close_delay,
                }) as Box<dyn FrameSource>),
                Plan::Stall => std::future::pending::<StreamResult<Box<dyn FrameSource>>>().await,
            }
        })
    }
}

struct ScriptedSource {
    steps: VecDeque<Step>,
    closes: Arc<AtomicUsize>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    close_delay: Option<Duration>,
}

impl FrameSource for ScriptedSource {
    fn send_subscribe<'a>(&'a mut self, ticker: &'a str) -> BoxFuture<'a, StreamResult<()>> {
        self.subscriptions.lock().push(ticker.to_string());
        Box::pin(async { Ok(()) })
    }

    fn next_frame(&mut self) -> BoxFuture<'_, StreamResult<Option<InboundFrame>>> {
        Box::pin(async move {
            loop {
                match self.steps.pop_front() {
                    Some(Step::Frame(frame)) => return Ok(Some(frame)),
                    Some(Step::Delay(d)) => tokio::time::sleep(d).await,
                    Some(Step::End) => return Ok(None),
                    Some(Step::Fail(reason)) => return Err(StreamError::Transport(reason)),
                    Some(Step::Hang) | None => std::future::pending::<()>().await,
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, StreamResult<()>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let delay = self.close_delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
    }
}

/// Replays auth results in order, then succeeds forever.
pub struct ScriptedAuth {
    results: Mutex<VecDeque<Result<Credential, AuthError>>>,
    calls: AtomicUsize,
}

impl ScriptedAuth {
    pub fn ok() -> Arc<Self> {
        Self::with_results(Vec::new())
    }

    pub fn with_results(results: Vec<Result<Credential, AuthError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Credential, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Credential::new("test-token", None)))
    }
}

impl Authenticator for ScriptedAuth {
    fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        let result = self.next();
        Box::pin(async move { result })
    }

    fn refresh<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, Result<Credential, AuthError>> {
        let result = self.next();
        Box::pin(async move { result })
    }
}
