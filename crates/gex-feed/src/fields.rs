//! Field extraction from loosely typed vendor JSON.
//!
//! Vendors send numbers as JSON numbers, numeric strings, or sentinels for
//! "no data". Everything here returns `None` for unusable values instead of
//! failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Vendor placeholder for a greek or volatility that has not been computed.
pub const NO_DATA_SENTINEL: f64 = -999.0;

/// Epoch values above this are milliseconds, below are seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Coerce a JSON number or numeric string to a finite `f64`.
pub fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => number_from_str(s)?,
        _ => return None,
    };
    (n.is_finite() && n != NO_DATA_SENTINEL).then_some(n)
}

/// Parse a numeric string such as a strike map key (`"657.0"`).
pub fn number_from_str(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n != NO_DATA_SENTINEL)
}

/// First key present with a usable number.
pub fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(number))
}

/// First key present with a non-empty string.
pub fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| {
        obj.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

/// First key present with a parseable timestamp.
pub fn first_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(timestamp))
}

/// Whether any of `keys` is present (whatever its value).
pub fn has_any(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| obj.contains_key(*k))
}

/// Timestamp from RFC 3339 / ISO strings, plain dates, or epoch numbers.
pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => timestamp_from_str(s),
        Value::Number(_) => {
            let raw = number(value)?;
            let millis = if raw > EPOCH_MILLIS_THRESHOLD {
                raw
            } else {
                raw * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}

/// Accepts `2026-02-17T21:00:00.000+00:00`, `2026-02-17T21:00:00`,
/// `2026-02-17`, and expiry map keys like `2026-02-17:2`.
pub fn timestamp_from_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    let date_part = s.split(':').next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
