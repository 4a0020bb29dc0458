#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

use trc_backtester::models::Bar;

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn dec(v: f64) -> Decimal {
    Decimal::from_str(&v.to_string()).unwrap()
}

/// Create bars from (open, high, low, close) tuples with 5-minute timestamps.
pub fn make_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| {
            Bar::new(
                base_time() + Duration::minutes(5 * i as i64),
                dec(o),
                dec(h),
                dec(l),
                dec(c),
                Decimal::from(100),
            )
        })
        .collect()
}

/// Bearish bootstrap, pullback high, BOS down, CHOCH up, then a retest.
pub fn reversal_bars() -> Vec<Bar> {
    make_bars(&[
        (100.0, 101.0, 99.0, 99.5),
        (99.5, 102.0, 99.0, 101.5),
        (101.0, 101.0, 98.0, 98.5),
        (98.5, 104.0, 98.5, 103.2),
        (103.2, 103.5, 101.0, 102.0),
    ])
}

/// Render bars in the CSV layout read by `CsvBarSource`.
pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("time,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.to_rfc3339(),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

/// Fresh per-process scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trc_integ_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
