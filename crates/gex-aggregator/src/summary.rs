//! Key levels of a snapshot.

use gex_core::{GammaSnapshot, Strike};

/// Headline numbers for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GexSummary {
    /// Sum of `total_gex` over all strikes.
    pub net_gex: f64,
    /// Strike with the largest `|total_gex|`.
    pub gamma_peak: Option<Strike>,
    /// Strike with the most positive `total_gex`.
    pub call_wall: Option<Strike>,
    /// Strike with the most negative `total_gex`.
    pub put_wall: Option<Strike>,
}

/// Compute the key levels; ties resolve to the lower strike.
pub fn summarize(snapshot: &GammaSnapshot) -> GexSummary {
    let mut summary = GexSummary {
        net_gex: 0.0,
        gamma_peak: None,
        call_wall: None,
        put_wall: None,
    };
    let (mut peak, mut max, mut min) = (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY);

    for level in snapshot.iter() {
        let total = level.total_gex();
        summary.net_gex += total;
        if total.abs() > peak {
            peak = total.abs();
            summary.gamma_peak = Some(level.strike());
        }
        if total > max {
            max = total;
            summary.call_wall = Some(level.strike());
        }
        if total < min {
            min = total;
            summary.put_wall = Some(level.strike());
        }
    }

    summary
}
