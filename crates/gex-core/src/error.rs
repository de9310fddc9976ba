//! Error types for gex-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid strike: {0}")]
    InvalidStrike(f64),

    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("Invalid option type: {0}")]
    InvalidOptionType(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
