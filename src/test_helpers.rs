use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::Bar;

/// 2025-01-01T09:00:00Z, the start of every generated series.
pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn dec_f(v: f64) -> Decimal {
    Decimal::from_str(&v.to_string()).unwrap()
}

/// One bar from an (open, high, low, close) tuple with volume 100.
pub fn bar_at(timestamp: DateTime<Utc>, (o, h, l, c): (f64, f64, f64, f64)) -> Bar {
    Bar::new(timestamp, dec_f(o), dec_f(h), dec_f(l), dec_f(c), Decimal::from(100))
}

/// Create bars from (open, high, low, close) tuples at 5-minute spacing.
pub fn make_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &ohlc)| bar_at(base_time() + Duration::minutes(5 * i as i64), ohlc))
        .collect()
}
