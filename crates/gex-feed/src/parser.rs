//! Option-chain message parsing.
//!
//! Recognised shapes, any mix of which may appear in one message:
//! 1. Chain maps: `{"callExpDateMap": {"2026-02-17:2": {"657.0": [entry]}}, "putExpDateMap": ...}`
//! 2. Flat entry arrays under `contracts`, `options` or `data`
//! 3. A single top-level entry (the message itself carries a strike)
//!
//! Each entry decodes to an [`EntryOutcome`]; unparseable entries are dropped
//! and counted, never raised.

use crate::error::{FeedError, FeedResult};
use crate::fields::{
    first_number, first_str, first_timestamp, has_any, number, number_from_str, timestamp_from_str,
};
use chrono::{DateTime, Utc};
use gex_core::{OptionContract, OptionType};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const STRIKE_KEYS: &[&str] = &["strikePrice", "strike", "strike_price"];
const TYPE_KEYS: &[&str] = &["putCall", "option_type", "optionType", "contractType", "type", "right"];
const ENTRY_TICKER_KEYS: &[&str] = &["underlyingSymbol", "underlying", "ticker", "root"];
const MESSAGE_TICKER_KEYS: &[&str] = &["symbol", "underlyingSymbol", "underlying", "ticker"];
const GAMMA_KEYS: &[&str] = &["gamma"];
const OPEN_INTEREST_KEYS: &[&str] = &["openInterest", "open_interest", "oi"];
const EXPIRATION_KEYS: &[&str] = &["expirationDate", "expiration", "expiry", "expiration_date"];
const IV_KEYS: &[&str] = &["volatility", "impliedVolatility", "implied_volatility", "iv"];
const ENTRY_ARRAY_KEYS: &[&str] = &["contracts", "options", "data"];
const CHAIN_MAPS: &[(&str, OptionType)] = &[
    ("callExpDateMap", OptionType::Call),
    ("putExpDateMap", OptionType::Put),
];
const SPOT_KEYS: &[&str] = &["underlyingPrice", "underlying_price", "spotPrice", "spot"];
const NESTED_QUOTE_KEYS: &[&str] = &["underlying", "quote"];
const LAST_KEYS: &[&str] = &["lastPrice", "last", "mark"];

/// Result of parsing one message.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    pub contracts: Vec<OptionContract>,
    /// `None` when the message carried no spot; the caller keeps its last one.
    pub spot_price: Option<f64>,
    /// Entries recognised but dropped as noise.
    pub dropped: usize,
}

/// Why an entry was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    NotAnObject,
    MissingStrike,
    MissingOptionType,
    MissingTicker,
    TickerMismatch { expected: String, found: String },
    Invalid(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "entry is not an object"),
            Self::MissingStrike => write!(f, "missing strike"),
            Self::MissingOptionType => write!(f, "missing option type"),
            Self::MissingTicker => write!(f, "missing ticker"),
            Self::TickerMismatch { expected, found } => {
                write!(f, "ticker mismatch: expected {expected}, found {found}")
            }
            Self::Invalid(reason) => write!(f, "invalid contract: {reason}"),
        }
    }
}

/// Decode outcome for one entry.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Parsed(OptionContract),
    Unparseable(DropReason),
}

/// Parse counters.
#[derive(Debug, Default)]
pub struct ParseStats {
    messages: AtomicU64,
    contracts: AtomicU64,
    dropped_entries: AtomicU64,
    rejected_messages: AtomicU64,
}

impl ParseStats {
    fn record_message(&self, contracts: usize, dropped: usize) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.contracts.fetch_add(contracts as u64, Ordering::Relaxed);
        self.dropped_entries.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn contracts(&self) -> u64 {
        self.contracts.load(Ordering::Relaxed)
    }

    pub fn dropped_entries(&self) -> u64 {
        self.dropped_entries.load(Ordering::Relaxed)
    }

    pub fn rejected_messages(&self) -> u64 {
        self.rejected_messages.load(Ordering::Relaxed)
    }
}

/// Hints an entry inherits from its position in the message.
struct EntryContext<'a> {
    requested: &'a str,
    message_ticker: Option<&'a str>,
    strike: Option<f64>,
    option_type: Option<OptionType>,
    expiration: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
}

impl<'a> EntryContext<'a> {
    fn top_level(requested: &'a str, message_ticker: Option<&'a str>, now: DateTime<Utc>) -> Self {
        Self {
            requested,
            message_ticker,
            strike: None,
            option_type: None,
            expiration: None,
            now,
        }
    }
}

/// Stateless message parser (apart from counters).
#[derive(Debug, Default)]
pub struct ContractParser {
    stats: ParseStats,
}

impl ContractParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Decode a text frame and parse it.
    pub fn parse_text(&self, text: &str, ticker: &str) -> FeedResult<ParsedMessage> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            self.stats.record_rejected();
            FeedError::from(e)
        })?;
        self.parse(&value, ticker)
    }

    /// Parse one message for `ticker`.
    ///
    /// Fails only when `raw` is not a mapping. Entries missing a strike,
    /// option type or ticker are dropped; gamma and open interest default
    /// to zero.
    pub fn parse(&self, raw: &Value, ticker: &str) -> FeedResult<ParsedMessage> {
        let Some(obj) = raw.as_object() else {
            self.stats.record_rejected();
            return Err(FeedError::ParseError(format!(
                "Expected a JSON object, got {}",
                json_kind(raw)
            )));
        };

        let requested = ticker.trim().to_ascii_uppercase();
        // On a message that is itself an entry, `symbol` is the option's OCC
        // symbol; only its root names the underlying.
        let is_entry = has_any(obj, STRIKE_KEYS);
        let message_ticker = if is_entry {
            first_str(obj, ENTRY_TICKER_KEYS)
                .or_else(|| first_str(obj, &["symbol"]).and_then(occ_root))
        } else {
            first_str(obj, MESSAGE_TICKER_KEYS)
        };
        let ctx = EntryContext::top_level(&requested, message_ticker, Utc::now());

        let mut outcomes = Vec::new();
        self.collect_chain_maps(obj, &ctx, &mut outcomes);

        for key in ENTRY_ARRAY_KEYS {
            if let Some(entries) = obj.get(*key).and_then(Value::as_array) {
                outcomes.extend(entries.iter().map(|e| self.parse_entry(e, &ctx)));
            }
        }

        if is_entry {
            outcomes.push(self.parse_entry(raw, &ctx));
        }

        let mut parsed = ParsedMessage {
            spot_price: extract_spot(obj, is_entry),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                EntryOutcome::Parsed(contract) => parsed.contracts.push(contract),
                EntryOutcome::Unparseable(reason) => {
                    debug!(ticker = %requested, %reason, "Dropping option entry");
                    parsed.dropped += 1;
                }
            }
        }

        self.stats
            .record_message(parsed.contracts.len(), parsed.dropped);
        debug!(
            ticker = %requested,
            contracts = parsed.contracts.len(),
            dropped = parsed.dropped,
            spot = ?parsed.spot_price,
            "Parsed option message"
        );
        Ok(parsed)
    }

    fn collect_chain_maps(
        &self,
        obj: &Map<String, Value>,
        ctx: &EntryContext<'_>,
        outcomes: &mut Vec<EntryOutcome>,
    ) {
        for (map_key, option_type) in CHAIN_MAPS {
            let Some(exp_map) = obj.get(*map_key).and_then(Value::as_object) else {
                continue;
            };

            for (exp_key, strikes) in exp_map {
                let Some(strikes) = strikes.as_object() else {
                    debug!(map = %map_key, expiry = %exp_key, "Expiry bucket is not an object");
                    continue;
                };

                for (strike_key, entries) in strikes {
                    let Some(entries) = entries.as_array() else {
                        debug!(map = %map_key, strike = %strike_key, "Strike bucket is not an array");
                        continue;
                    };

                    let entry_ctx = EntryContext {
                        strike: number_from_str(strike_key),
                        option_type: Some(*option_type),
                        expiration: timestamp_from_str(exp_key),
                        ..*ctx
                    };
                    outcomes.extend(entries.iter().map(|e| self.parse_entry(e, &entry_ctx)));
                }
            }
        }
    }

    fn parse_entry(&self, entry: &Value, ctx: &EntryContext<'_>) -> EntryOutcome {
        match decode_entry(entry, ctx) {
            Ok(contract) => EntryOutcome::Parsed(contract),
            Err(reason) => EntryOutcome::Unparseable(reason),
        }
    }
}

fn decode_entry(entry: &Value, ctx: &EntryContext<'_>) -> Result<OptionContract, DropReason> {
    let obj = entry.as_object().ok_or(DropReason::NotAnObject)?;

    let strike = first_number(obj, STRIKE_KEYS)
        .or(ctx.strike)
        .filter(|s| *s > 0.0)
        .ok_or(DropReason::MissingStrike)?;

    // The chain map a contract sits in is authoritative for its right.
    let option_type = ctx
        .option_type
        .or_else(|| first_str(obj, TYPE_KEYS).and_then(|s| s.parse().ok()))
        .ok_or(DropReason::MissingOptionType)?;

    let ticker = first_str(obj, ENTRY_TICKER_KEYS)
        .or(ctx.message_ticker)
        .map(str::to_ascii_uppercase)
        .or_else(|| (!ctx.requested.is_empty()).then(|| ctx.requested.to_string()))
        .ok_or(DropReason::MissingTicker)?;
    if !ctx.requested.is_empty() && ticker != ctx.requested {
        return Err(DropReason::TickerMismatch {
            expected: ctx.requested.to_string(),
            found: ticker,
        });
    }

    let gamma = first_number(obj, GAMMA_KEYS).unwrap_or(0.0);
    let open_interest = first_number(obj, OPEN_INTEREST_KEYS)
        .filter(|oi| *oi >= 0.0)
        .map(|oi| oi.floor() as u64)
        .unwrap_or(0);
    let expiration = first_timestamp(obj, EXPIRATION_KEYS)
        .or(ctx.expiration)
        .unwrap_or(ctx.now);

    let bid = first_number(obj, &["bid"]).unwrap_or(0.0);
    let ask = first_number(obj, &["ask"]).unwrap_or(0.0);
    let last_price = first_number(obj, &["mark"])
        .filter(|m| *m > 0.0)
        .or_else(|| first_number(obj, &["last", "lastPrice"]))
        .unwrap_or(0.0);
    let iv = first_number(obj, IV_KEYS)
        .filter(|v| *v >= 0.0)
        .unwrap_or(0.0);

    OptionContract::new(&ticker, strike, expiration, gamma, open_interest, option_type)
        .map(|c| c.with_quotes(bid, ask, last_price, iv))
        .map_err(|e| DropReason::Invalid(e.to_string()))
}

/// Underlying spot price, if the message carries one.
///
/// Top-level `lastPrice`/`mark`/bid-ask are only trusted when the message is
/// not itself an option entry, where those fields price the option.
fn extract_spot(obj: &Map<String, Value>, is_entry: bool) -> Option<f64> {
    let positive = |v: f64| (v > 0.0).then_some(v);

    if let Some(spot) = first_number(obj, SPOT_KEYS).and_then(positive) {
        return Some(spot);
    }

    for key in NESTED_QUOTE_KEYS {
        if let Some(quote) = obj.get(*key).and_then(Value::as_object) {
            if let Some(spot) = quote_price(quote).and_then(positive) {
                return Some(spot);
            }
        }
    }

    if is_entry {
        return None;
    }
    symbol_keyed_spot(obj)
        .and_then(positive)
        .or_else(|| quote_price(obj).and_then(positive))
}

/// Quote responses keyed by symbol: `{"SPY": {"quote": {...}, "extended": {...}}}`.
fn symbol_keyed_spot(obj: &Map<String, Value>) -> Option<f64> {
    let last = |m: &Map<String, Value>, keys: &[&str]| {
        keys.iter()
            .find_map(|k| m.get(*k).and_then(number).filter(|p| *p > 0.0))
    };

    obj.values().filter_map(Value::as_object).find_map(|entry| {
        entry
            .get("quote")
            .and_then(Value::as_object)
            .and_then(|q| last(q, &["lastPrice", "mark"]))
            .or_else(|| {
                entry
                    .get("extended")
                    .and_then(Value::as_object)
                    .and_then(|x| last(x, &["lastPrice"]))
            })
            .or_else(|| last(entry, &["lastPrice"]))
    })
}

fn quote_price(quote: &Map<String, Value>) -> Option<f64> {
    let last = LAST_KEYS
        .iter()
        .find_map(|k| quote.get(*k).and_then(number).filter(|p| *p > 0.0));
    last.or_else(|| {
        let bid = first_number(quote, &["bid", "bidPrice"])?;
        let ask = first_number(quote, &["ask", "askPrice"])?;
        Some((bid + ask) / 2.0)
    })
}

/// Underlying root of an OCC option symbol: `"SPY   260217C00657000"` -> `"SPY"`.
fn occ_root(symbol: &str) -> Option<&str> {
    let symbol = symbol.trim_start();
    let end = symbol
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '.'))
        .unwrap_or(symbol.len());
    Some(&symbol[..end]).filter(|root| !root.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
