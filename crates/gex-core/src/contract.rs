//! Option contract types.
//!
//! An `OptionContract` is one normalized option quote at one instant. It is
//! built fresh for every parsed message and never mutated afterwards.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Shares delivered per listed equity option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for OptionType {
    type Err = CoreError;

    /// Accepts `CALL`/`C` and `PUT`/`P`, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CALL" | "C" => Ok(Self::Call),
            "PUT" | "P" => Ok(Self::Put),
            other => Err(CoreError::InvalidOptionType(other.to_string())),
        }
    }
}

/// Strike price used as the aggregation key.
///
/// Always positive and finite, which makes the total order from
/// `f64::total_cmp` agree with numeric order and lets the type be a map key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Strike(f64);

impl Strike {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidStrike(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Strike {
    type Error = CoreError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Strike> for f64 {
    fn from(strike: Strike) -> Self {
        strike.0
    }
}

impl PartialEq for Strike {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Strike {}

impl PartialOrd for Strike {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Strike {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Strike {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Strike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One option instrument at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying symbol (non-empty, upper case).
    pub ticker: String,
    pub strike: Strike,
    /// May lie in the past for expired listings still present in a chain.
    pub expiration: DateTime<Utc>,
    /// Raw vendor gamma, before any dealer sign convention.
    pub gamma: f64,
    pub open_interest: u64,
    pub option_type: OptionType,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    /// Mark when the vendor supplies one, otherwise last trade.
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub implied_volatility: f64,
}

impl OptionContract {
    /// Create a contract with empty quote fields.
    pub fn new(
        ticker: &str,
        strike: f64,
        expiration: DateTime<Utc>,
        gamma: f64,
        open_interest: u64,
        option_type: OptionType,
    ) -> Result<Self> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(CoreError::InvalidTicker(ticker.to_string()));
        }

        Ok(Self {
            ticker: ticker.to_ascii_uppercase(),
            strike: Strike::new(strike)?,
            expiration,
            gamma,
            open_interest,
            option_type,
            bid: 0.0,
            ask: 0.0,
            last_price: 0.0,
            implied_volatility: 0.0,
        })
    }

    /// Attach bid/ask/last/IV quote fields.
    pub fn with_quotes(mut self, bid: f64, ask: f64, last_price: f64, iv: f64) -> Self {
        self.bid = bid;
        self.ask = ask;
        self.last_price = last_price;
        self.implied_volatility = iv;
        self
    }

    pub fn is_call(&self) -> bool {
        self.option_type.is_call()
    }
}
