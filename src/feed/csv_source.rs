use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::feed::BarSource;
use crate::models::Bar;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Streams bars from a `time,open,high,low,close,volume` CSV with a header row.
///
/// Timestamps are RFC 3339; values without an offset are taken as UTC.
pub struct CsvBarSource {
    path: PathBuf,
    rows: csv::StringRecordsIntoIter<File>,
}

impl CsvBarSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .with_context(|| format!("Failed to open bar file {}", path.display()))?;

        Ok(Self {
            path,
            rows: reader.into_records(),
        })
    }

    fn parse_record(&self, record: &csv::StringRecord) -> Result<Bar> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize, name: &str| -> Result<&str> {
            record
                .get(idx)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow!("{}:{} missing {}", self.path.display(), line, name))
        };
        let decimal = |idx: usize, name: &str| -> Result<Decimal> {
            let raw = field(idx, name)?;
            Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)).with_context(|| {
                format!("{}:{} bad {} value {:?}", self.path.display(), line, name, raw)
            })
        };

        let raw_time = field(0, "time")?;
        let timestamp = parse_timestamp(raw_time).with_context(|| {
            format!("{}:{} bad timestamp {:?}", self.path.display(), line, raw_time)
        })?;

        Ok(Bar {
            timestamp,
            open: decimal(1, "open")?,
            high: decimal(2, "high")?,
            low: decimal(3, "low")?,
            close: decimal(4, "close")?,
            volume: decimal(5, "volume")?,
        })
    }
}

#[async_trait]
impl BarSource for CsvBarSource {
    async fn next_bar(&mut self) -> Result<Option<Bar>> {
        let Some(record) = self.rows.next() else {
            return Ok(None);
        };
        let record =
            record.with_context(|| format!("Failed to read {}", self.path.display()))?;
        self.parse_record(&record).map(Some)
    }
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(anyhow!("unrecognised timestamp {:?}", raw))
}
