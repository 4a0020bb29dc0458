use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Timestamps are UTC; sources normalise on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bootstrap rule: a flat bar counts as bullish.
    pub fn closes_up(&self) -> bool {
        self.close >= self.open
    }

    /// Fold a later bar of the same period into this one.
    pub fn merge(&mut self, later: &Bar) {
        self.high = self.high.max(later.high);
        self.low = self.low.min(later.low);
        self.close = later.close;
        self.volume += later.volume;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{bar_at, base_time};
    use rust_decimal_macros::dec;

    #[test]
    fn flat_bar_closes_up() {
        let b = bar_at(base_time(), (100.0, 101.0, 99.0, 100.0));
        assert!(b.closes_up());
        let b = bar_at(base_time(), (100.0, 101.0, 99.0, 99.5));
        assert!(!b.closes_up());
    }

    #[test]
    fn merge_keeps_open_and_extends_range() {
        let mut a = bar_at(base_time(), (100.0, 102.0, 99.0, 101.0));
        let b = bar_at(base_time(), (101.0, 104.0, 98.5, 103.0));
        a.merge(&b);
        assert_eq!(a.open, dec!(100));
        assert_eq!(a.high, dec!(104));
        assert_eq!(a.low, dec!(98.5));
        assert_eq!(a.close, dec!(103));
        assert_eq!(a.volume, dec!(200));
    }

    #[test]
    fn serde_keeps_decimal_precision() {
        let b = bar_at(base_time(), (1.1, 1.3, 1.0, 1.2));
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"1.1\""));
        let back: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
