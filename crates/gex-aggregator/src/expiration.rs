//! Expiration-date filtering.

use chrono::{Datelike, Duration, NaiveDate};
use gex_core::OptionContract;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which expirations to include in an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpirationFilter {
    /// Only contracts expiring today (0DTE).
    Today,
    /// Everything expiring on or before the next Friday.
    NextFriday,
    /// Everything expiring on or before the Friday after next.
    TwoFridays,
    #[default]
    All,
}

impl fmt::Display for ExpirationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::NextFriday => write!(f, "next-friday"),
            Self::TwoFridays => write!(f, "two-fridays"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for ExpirationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "next-friday" => Ok(Self::NextFriday),
            "two-fridays" => Ok(Self::TwoFridays),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown expiration filter {other:?} (expected today, next-friday, two-fridays, all)"
            )),
        }
    }
}

/// The next Friday strictly after `today`.
pub fn next_friday(today: NaiveDate) -> NaiveDate {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let mut days = (4 - weekday).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    today + Duration::days(days)
}

/// The Friday one week after [`next_friday`].
pub fn two_fridays_out(today: NaiveDate) -> NaiveDate {
    next_friday(today) + Duration::days(7)
}

/// Contracts whose expiration date (UTC) passes `filter` relative to `today`.
pub fn filter_by_expiration(
    contracts: &[OptionContract],
    filter: ExpirationFilter,
    today: NaiveDate,
) -> Vec<OptionContract> {
    let keep: Box<dyn Fn(NaiveDate) -> bool> = match filter {
        ExpirationFilter::Today => Box::new(move |d| d == today),
        ExpirationFilter::NextFriday => {
            let cutoff = next_friday(today);
            Box::new(move |d| d <= cutoff)
        }
        ExpirationFilter::TwoFridays => {
            let cutoff = two_fridays_out(today);
            Box::new(move |d| d <= cutoff)
        }
        ExpirationFilter::All => return contracts.to_vec(),
    };

    contracts
        .iter()
        .filter(|c| keep(c.expiration.date_naive()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gex_core::OptionType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expiring(d: NaiveDate) -> OptionContract {
        let exp = Utc.from_utc_datetime(&d.and_hms_opt(21, 0, 0).unwrap());
        OptionContract::new("SPY", 500.0, exp, 0.01, 10, OptionType::Call).unwrap()
    }

    #[test]
    fn test_next_friday() {
        // 2026-02-16 is a Monday.
        assert_eq!(next_friday(date(2026, 2, 16)), date(2026, 2, 20));
        assert_eq!(next_friday(date(2026, 2, 19)), date(2026, 2, 20));
        // A Friday rolls to the following week.
        assert_eq!(next_friday(date(2026, 2, 20)), date(2026, 2, 27));
        assert_eq!(next_friday(date(2026, 2, 21)), date(2026, 2, 27));
        assert_eq!(two_fridays_out(date(2026, 2, 16)), date(2026, 2, 27));
    }

    #[test]
    fn test_filter_by_expiration() {
        let today = date(2026, 2, 16);
        let contracts = vec![
            expiring(today),
            expiring(date(2026, 2, 20)),
            expiring(date(2026, 2, 27)),
            expiring(date(2026, 3, 20)),
        ];

        assert_eq!(filter_by_expiration(&contracts, ExpirationFilter::Today, today).len(), 1);
        assert_eq!(filter_by_expiration(&contracts, ExpirationFilter::NextFriday, today).len(), 2);
        assert_eq!(filter_by_expiration(&contracts, ExpirationFilter::TwoFridays, today).len(), 3);
        assert_eq!(filter_by_expiration(&contracts, ExpirationFilter::All, today).len(), 4);
    }

    #[test]
    fn test_expiration_filter_parse() {
        assert_eq!("next-friday".parse::<ExpirationFilter>(), Ok(ExpirationFilter::NextFriday));
        assert_eq!("TODAY".parse::<ExpirationFilter>(), Ok(ExpirationFilter::Today));
        assert!("monthly".parse::<ExpirationFilter>().is_err());
        assert_eq!(ExpirationFilter::TwoFridays.to_string(), "two-fridays");
    }
}
