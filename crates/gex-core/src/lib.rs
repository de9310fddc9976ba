//! Core domain types for option-chain gamma exposure.
//!
//! This crate provides the values shared by the parser, the aggregator and
//! the streaming session:
//! - `OptionContract`, `OptionType`: one normalized option quote
//! - `Strike`: totally ordered strike key
//! - `GammaLevel`, `GammaSnapshot`: aggregated exposure per strike
//! - `MonotonicClock`: non-decreasing snapshot timestamps

pub mod clock;
pub mod contract;
pub mod error;
pub mod snapshot;

pub use clock::MonotonicClock;
pub use contract::{OptionContract, OptionType, Strike, CONTRACT_MULTIPLIER};
pub use error::{CoreError, Result};
pub use snapshot::{GammaLevel, GammaSnapshot};
