//! Collaborator seams for the streaming session.
//!
//! The session owns the retry loop; authentication and the wire protocol are
//! injected behind these traits so each can be swapped or scripted in tests.

use crate::auth::Credential;
use crate::error::{AuthError, StreamResult};
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A decoded inbound frame, classified by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Market-data payload for the contract parser.
    Data(serde_json::Value),
    /// Liveness-only frame (pong, server heartbeat).
    Heartbeat,
    /// The subscription was accepted.
    SubscriptionAck,
    /// The subscription was refused; never retried.
    SubscriptionRejected(String),
}

/// Obtains and renews credentials.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>>;

    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<Credential, AuthError>>;
}

/// Opens connections to the data source.
pub trait Transport: Send + Sync {
    fn connect<'a>(
        &'a self,
        credential: &'a Credential,
        ticker: &'a str,
    ) -> BoxFuture<'a, StreamResult<Box<dyn FrameSource>>>;
}

/// One open connection.
pub trait FrameSource: Send {
    fn send_subscribe<'a>(&'a mut self, ticker: &'a str) -> BoxFuture<'a, StreamResult<()>>;

    /// Next frame; `Ok(None)` when the source has ended.
    ///
    /// Must be cancel-safe: the session drops this future when its watchdog
    /// or shutdown fires.
    fn next_frame(&mut self) -> BoxFuture<'_, StreamResult<Option<InboundFrame>>>;

    fn close(&mut self) -> BoxFuture<'_, StreamResult<()>>;
}
