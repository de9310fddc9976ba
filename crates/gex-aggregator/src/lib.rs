//! Gamma exposure aggregation.
//!
//! Pure functions folding a batch of option contracts and a spot price into
//! a strike-indexed `GammaSnapshot`, plus ranking and filtering views:
//! - `calculate_gex`: per-strike call/put/total exposure
//! - `top_strikes`: largest absolute exposure first
//! - `filter_strikes`: percentage band around spot
//! - `filter_by_expiration`: today / next Friday / two Fridays out
//! - `summarize`: net exposure, gamma peak, call and put walls

pub mod aggregator;
pub mod error;
pub mod expiration;
pub mod summary;

pub use aggregator::{calculate_gex, calculate_gex_at, contract_gex, filter_strikes, top_strikes};
pub use error::{AggregateError, AggregateResult};
pub use expiration::{filter_by_expiration, next_friday, two_fridays_out, ExpirationFilter};
pub use summary::{summarize, GexSummary};
