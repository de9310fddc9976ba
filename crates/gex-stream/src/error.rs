//! Streaming error types.

use thiserror::Error;

/// Failure reported by the auth collaborator.
///
/// `permanent` marks a denial that retrying cannot fix (revoked app key,
/// missing token store); anything else is retried with backoff.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
    pub permanent: bool,
}

impl AuthError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Subscription rejected for {ticker}: {reason}")]
    SubscriptionRejected { ticker: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    #[error("Session closed")]
    SessionClosed,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Whether this error ends the session rather than triggering a retry.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Auth(e) => e.permanent,
            Self::SubscriptionRejected { .. }
            | Self::ReconnectExhausted(_)
            | Self::SessionClosed => true,
            _ => false,
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StreamError::SessionClosed.is_fatal());
        assert!(StreamError::ReconnectExhausted(3).is_fatal());
        assert!(StreamError::SubscriptionRejected {
            ticker: "ZZZZ".into(),
            reason: "unknown symbol".into()
        }
        .is_fatal());
        assert!(StreamError::Auth(AuthError::permanent("revoked")).is_fatal());

        assert!(!StreamError::Auth(AuthError::retryable("timeout")).is_fatal());
        assert!(!StreamError::Transport("reset".into()).is_fatal());
        assert!(!StreamError::ConnectionClosed {
            code: 1006,
            reason: "abnormal".into()
        }
        .is_fatal());
    }
}
