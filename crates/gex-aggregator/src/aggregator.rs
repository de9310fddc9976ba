//! Strike aggregation.
//!
//! Per-contract exposure is `gamma * open_interest * 100 * spot^2`, negated
//! for puts (dealers are assumed long call gamma and short put gamma).
//! Positive totals mark strikes where dealer hedging dampens moves, negative
//! totals mark strikes where it amplifies them.

use crate::error::{AggregateError, AggregateResult};
use chrono::{DateTime, Utc};
use gex_core::{GammaLevel, GammaSnapshot, OptionContract, OptionType, Strike, CONTRACT_MULTIPLIER};
use std::collections::BTreeMap;
use tracing::debug;

/// Signed exposure of a single contract.
pub fn contract_gex(contract: &OptionContract, spot_price: f64) -> f64 {
    let gex =
        contract.gamma * contract.open_interest as f64 * CONTRACT_MULTIPLIER * spot_price.powi(2);
    match contract.option_type {
        OptionType::Call => gex,
        OptionType::Put => -gex,
    }
}

/// Aggregate `contracts` into a snapshot stamped with the current time.
///
/// All contracts must belong to `ticker`. An empty batch yields a snapshot
/// with no levels.
pub fn calculate_gex(
    ticker: &str,
    contracts: &[OptionContract],
    spot_price: f64,
) -> AggregateResult<GammaSnapshot> {
    calculate_gex_at(ticker, contracts, spot_price, Utc::now())
}

/// Aggregate `contracts` into a snapshot stamped with `timestamp`.
pub fn calculate_gex_at(
    ticker: &str,
    contracts: &[OptionContract],
    spot_price: f64,
    timestamp: DateTime<Utc>,
) -> AggregateResult<GammaSnapshot> {
    if !spot_price.is_finite() || spot_price <= 0.0 {
        return Err(AggregateError::InvalidSpot(spot_price));
    }

    let mut buckets: BTreeMap<Strike, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for contract in contracts {
        let gex = contract_gex(contract, spot_price);
        let (calls, puts) = buckets.entry(contract.strike).or_default();
        if contract.is_call() {
            calls.push(gex);
        } else {
            puts.push(gex);
        }
    }

    let levels: BTreeMap<Strike, GammaLevel> = buckets
        .into_iter()
        .map(|(strike, (mut calls, mut puts))| {
            let level = GammaLevel::new(strike, ordered_sum(&mut calls), ordered_sum(&mut puts));
            (strike, level)
        })
        .collect();

    debug!(
        ticker,
        contracts = contracts.len(),
        levels = levels.len(),
        spot_price,
        "Calculated gamma exposure"
    );

    Ok(GammaSnapshot::new(ticker, timestamp, spot_price, levels))
}

/// Sum in a canonical order so the result does not depend on input order.
fn ordered_sum(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().fold(0.0, |acc, v| acc + v)
}

/// The `n` levels with the largest `|total_gex|`, descending.
///
/// Ties are broken by ascending strike.
pub fn top_strikes(snapshot: &GammaSnapshot, n: usize) -> Vec<GammaLevel> {
    let mut levels: Vec<GammaLevel> = snapshot.levels.values().copied().collect();
    levels.sort_by(|a, b| {
        b.total_gex()
            .abs()
            .total_cmp(&a.total_gex().abs())
            .then_with(|| a.strike().cmp(&b.strike()))
    });
    levels.truncate(n);
    levels
}

/// Copy of `snapshot` keeping strikes within `range_pct` percent of spot.
///
/// A strike survives when `|strike - spot| <= spot * range_pct / 100`.
/// Negative percentages behave as zero.
pub fn filter_strikes(snapshot: &GammaSnapshot, range_pct: f64) -> GammaSnapshot {
    let spot = snapshot.spot_price;
    let band = spot * range_pct.max(0.0) / 100.0;

    let levels = snapshot
        .levels
        .iter()
        .filter(|(strike, _)| (strike.value() - spot).abs() <= band)
        .map(|(strike, level)| (*strike, *level))
        .collect();

    GammaSnapshot::new(snapshot.ticker.clone(), snapshot.timestamp, spot, levels)
}
