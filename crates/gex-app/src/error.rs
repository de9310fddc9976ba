//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stream error: {0}")]
    Stream(#[from] Box<gex_stream::StreamError>),

    #[error("Aggregation error: {0}")]
    Aggregate(#[from] gex_aggregator::AggregateError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] gex_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] gex_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<gex_stream::StreamError> for AppError {
    fn from(e: gex_stream::StreamError) -> Self {
        Self::Stream(Box::new(e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
