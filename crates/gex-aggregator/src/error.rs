//! Aggregation error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("Invalid spot price: {0}")]
    InvalidSpot(f64),
}

pub type AggregateResult<T> = Result<T, AggregateError>;
