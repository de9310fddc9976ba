//! Aggregated gamma exposure types.
//!
//! A `GammaSnapshot` is a complete, immutable market view at one timestamp.
//! It is superseded by the next snapshot, never updated in place.

use crate::contract::Strike;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Aggregated exposure at one strike.
///
/// `total_gex` is always exactly `call_gex + put_gex`; the only way to build
/// a level is through [`GammaLevel::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaLevel {
    strike: Strike,
    call_gex: f64,
    put_gex: f64,
    total_gex: f64,
}

impl GammaLevel {
    pub fn new(strike: Strike, call_gex: f64, put_gex: f64) -> Self {
        Self {
            strike,
            call_gex,
            put_gex,
            total_gex: call_gex + put_gex,
        }
    }

    pub fn strike(&self) -> Strike {
        self.strike
    }

    pub fn call_gex(&self) -> f64 {
        self.call_gex
    }

    pub fn put_gex(&self) -> f64 {
        self.put_gex
    }

    pub fn total_gex(&self) -> f64 {
        self.total_gex
    }
}

/// Snapshot of all gamma levels for one ticker at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaSnapshot {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub spot_price: f64,
    /// Sparse over observed strikes, ascending by strike.
    pub levels: BTreeMap<Strike, GammaLevel>,
}

impl GammaSnapshot {
    pub fn new(
        ticker: impl Into<String>,
        timestamp: DateTime<Utc>,
        spot_price: f64,
        levels: BTreeMap<Strike, GammaLevel>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            timestamp,
            spot_price,
            levels,
        }
    }

    /// Look up the level at a strike given as a plain number.
    pub fn level(&self, strike: f64) -> Option<&GammaLevel> {
        Strike::new(strike).ok().and_then(|s| self.levels.get(&s))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels in ascending strike order.
    pub fn iter(&self) -> impl Iterator<Item = &GammaLevel> {
        self.levels.values()
    }
}
