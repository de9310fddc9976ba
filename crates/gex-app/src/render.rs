//! Console report for a snapshot.

use gex_aggregator::{filter_strikes, summarize, top_strikes};
use gex_core::{GammaSnapshot, Strike};
use std::fmt::Write;

/// Format an exposure figure with a B/M/K suffix and explicit sign.
pub fn format_gex(value: f64) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "+" };
    if abs >= 1e9 {
        format!("{sign}{:.2}B", abs / 1e9)
    } else if abs >= 1e6 {
        format!("{sign}{:.2}M", abs / 1e6)
    } else if abs >= 1e3 {
        format!("{sign}{:.2}K", abs / 1e3)
    } else {
        format!("{sign}{abs:.2}")
    }
}

fn format_strike(strike: Option<Strike>) -> String {
    strike.map_or_else(|| "-".to_string(), |s| format!("{:.2}", s.value()))
}

/// Render the header, the top-N strike table within the band around spot,
/// and the key levels.
pub fn render_report(snapshot: &GammaSnapshot, top_n: usize, range_pct: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} | spot {:.2} | {}",
        snapshot.ticker,
        snapshot.spot_price,
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let view = filter_strikes(snapshot, range_pct);
    if view.is_empty() {
        let _ = writeln!(out, "no strikes within {range_pct}% of spot");
        return out;
    }

    let _ = writeln!(
        out,
        "{:>10} {:>12} {:>12} {:>12}",
        "STRIKE", "CALL GEX", "PUT GEX", "NET GEX"
    );
    for level in top_strikes(&view, top_n) {
        let marker = if level.strike().value() <= snapshot.spot_price {
            ' '
        } else {
            '^'
        };
        let _ = writeln!(
            out,
            "{:>9.2}{marker} {:>12} {:>12} {:>12}",
            level.strike().value(),
            format_gex(level.call_gex()),
            format_gex(level.put_gex()),
            format_gex(level.total_gex()),
        );
    }

    let summary = summarize(snapshot);
    let _ = writeln!(
        out,
        "net {} | peak {} | call wall {} | put wall {}",
        format_gex(summary.net_gex),
        format_strike(summary.gamma_peak),
        format_strike(summary.call_wall),
        format_strike(summary.put_wall),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gex_core::GammaLevel;
    use std::collections::BTreeMap;

    fn snapshot(levels: &[(f64, f64, f64)]) -> GammaSnapshot {
        let levels: BTreeMap<Strike, GammaLevel> = levels
            .iter()
            .map(|&(strike, call, put)| {
                let strike = Strike::new(strike).unwrap();
                (strike, GammaLevel::new(strike, call, put))
            })
            .collect();
        GammaSnapshot {
            ticker: "SPY".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap(),
            spot_price: 500.0,
            levels,
        }
    }

    #[test]
    fn test_format_gex_suffixes() {
        assert_eq!(format_gex(2_500_000_000.0), "+2.50B");
        assert_eq!(format_gex(-1_250_000.0), "-1.25M");
        assert_eq!(format_gex(4_200.0), "+4.20K");
        assert_eq!(format_gex(-12.5), "-12.50");
        assert_eq!(format_gex(0.0), "+0.00");
    }

    #[test]
    fn test_report_lists_top_strikes_in_band() {
        let snap = snapshot(&[
            (400.0, 9e9, 0.0),
            (495.0, 1e6, -3e6),
            (500.0, 5e6, -1e6),
            (505.0, 2e5, 0.0),
        ]);
        let report = render_report(&snap, 2, 5.0);

        assert!(report.starts_with("SPY | spot 500.00 | 2024-03-15 14:30:00 UTC"));
        // 400 is outside the 5% band and 505 is ranked third.
        assert!(!report.contains("400.00"));
        assert!(report.contains("500.00"));
        assert!(report.contains("495.00"));
        assert!(!report.contains("505.00^"));
        // Key levels come from the full snapshot.
        assert!(report.contains("peak 400.00"));
        assert!(report.contains("put wall 495.00"));
    }

    #[test]
    fn test_report_empty_band() {
        let snap = snapshot(&[(100.0, 1e6, 0.0)]);
        let report = render_report(&snap, 10, 1.0);
        assert!(report.contains("no strikes within 1% of spot"));
    }
}
