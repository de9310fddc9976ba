//! Resilient option-chain streaming.
//!
//! Provides a long-lived session for one ticker:
//! - Connect / subscribe / stream lifecycle with observable state
//! - Staleness watchdog that treats a silent connection as dead
//! - Reconnection with capped exponential backoff and a fresh subscription
//! - Bounded drop-oldest hand-off to a single consumer
//!
//! Authentication and the wire protocol sit behind [`Authenticator`] and
//! [`Transport`]; [`TokenFileAuth`] and [`WsTransport`] are the production
//! implementations.

pub mod auth;
pub mod backoff;
pub mod error;
pub mod message;
pub mod queue;
pub mod session;
pub mod transport;
pub mod watchdog;
pub mod ws_transport;

pub use auth::{Credential, TokenFileAuth};
pub use backoff::Backoff;
pub use error::{AuthError, StreamError, StreamResult};
pub use message::{ChannelMessage, WsRequest};
pub use queue::BatchQueue;
pub use session::{
    ContractBatch, SessionState, SessionStats, StateTransition, StreamConfig, StreamSession,
};
pub use transport::{Authenticator, BoxFuture, FrameSource, InboundFrame, Transport};
pub use watchdog::StalenessWatchdog;
pub use ws_transport::{classify_text, WsFrameSource, WsTransport};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
