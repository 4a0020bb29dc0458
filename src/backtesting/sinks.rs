use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::models::{EventKind, Trade, TrcEvent};

pub const EVENT_HEADER: [&str; 8] = [
    "time_utc",
    "type",
    "level",
    "bar_close",
    "pivot",
    "setup_seq",
    "zone_low",
    "zone_high",
];

pub const TRADE_HEADER: [&str; 8] = [
    "trade_id",
    "time_utc",
    "symbol",
    "side",
    "entry",
    "stop_loss",
    "take_profit",
    "setup_seq",
];

#[async_trait]
pub trait EventSink: Send {
    async fn write(&mut self, event: &TrcEvent) -> Result<()>;
    async fn flush(&mut self) -> Result<()>;
}

#[async_trait]
pub trait TradeSink: Send {
    async fn write(&mut self, trade: &Trade) -> Result<()>;
    async fn flush(&mut self) -> Result<()>;
}

/// Append-only CSV file with its header written on creation.
struct CsvFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl CsvFile {
    async fn create(path: &Path, header: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut csv = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        };
        csv.write_row(header).await?;
        Ok(csv)
    }

    async fn write_row<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let line = encode_row(fields)?;
        self.out
            .write_all(&line)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Drain the buffer and sync the file to disk.
    async fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        self.out
            .get_ref()
            .sync_all()
            .await
            .with_context(|| format!("Failed to sync {}", self.path.display()))
    }
}

fn encode_row<I, T>(fields: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(128));
    w.write_record(fields)?;
    Ok(w.into_inner().map_err(|e| e.into_error())?)
}

fn time_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn opt(v: Option<Decimal>) -> String {
    v.map(|d| d.to_string()).unwrap_or_default()
}

/// Columns after `time_utc,type`: level, bar_close, pivot, setup_seq, zone_low, zone_high.
fn event_columns(kind: &EventKind) -> [String; 6] {
    let blank = String::new;
    match *kind {
        EventKind::BosUp { level, higher_low } => [
            level.to_string(),
            blank(),
            opt(higher_low),
            blank(),
            blank(),
            blank(),
        ],
        EventKind::BosDown { level, lower_high } => [
            level.to_string(),
            blank(),
            opt(lower_high),
            blank(),
            blank(),
            blank(),
        ],
        EventKind::ChochUp { level, bar_close } | EventKind::ChochDown { level, bar_close } => [
            level.to_string(),
            bar_close.to_string(),
            blank(),
            blank(),
            blank(),
            blank(),
        ],
        EventKind::LongSetup {
            setup_seq,
            zone_low,
            zone_high,
        }
        | EventKind::ShortSetup {
            setup_seq,
            zone_low,
            zone_high,
        }
        | EventKind::LongEntry {
            setup_seq,
            zone_low,
            zone_high,
        }
        | EventKind::ShortEntry {
            setup_seq,
            zone_low,
            zone_high,
        } => [
            blank(),
            blank(),
            blank(),
            setup_seq.to_string(),
            zone_low.to_string(),
            zone_high.to_string(),
        ],
    }
}

/// Writes events to `events.csv`.
pub struct CsvEventSink {
    file: CsvFile,
}

impl CsvEventSink {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: CsvFile::create(path.as_ref(), &EVENT_HEADER).await?,
        })
    }
}

#[async_trait]
impl EventSink for CsvEventSink {
    async fn write(&mut self, event: &TrcEvent) -> Result<()> {
        let [level, bar_close, pivot, setup_seq, zone_low, zone_high] = event_columns(&event.kind);
        self.file
            .write_row([
                time_utc(event.timestamp),
                event.kind.name().to_string(),
                level,
                bar_close,
                pivot,
                setup_seq,
                zone_low,
                zone_high,
            ])
            .await
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await
    }
}

/// Writes trade intents to `trades.csv`.
pub struct CsvTradeSink {
    file: CsvFile,
}

impl CsvTradeSink {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: CsvFile::create(path.as_ref(), &TRADE_HEADER).await?,
        })
    }
}

#[async_trait]
impl TradeSink for CsvTradeSink {
    async fn write(&mut self, trade: &Trade) -> Result<()> {
        self.file
            .write_row([
                trade.trade_id.to_string(),
                time_utc(trade.timestamp),
                trade.symbol.clone(),
                trade.side.to_string(),
                trade.entry_price.to_string(),
                opt(trade.stop_loss),
                opt(trade.take_profit),
                trade.setup_seq.to_string(),
            ])
            .await
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await
    }
}

/// Records everything written to it. Clone the handle before boxing the sink
/// to read the records back after a run.
pub struct MemorySink<T> {
    items: Arc<Mutex<Vec<T>>>,
    flushes: Arc<Mutex<u32>>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            flushes: Arc::new(Mutex::new(0)),
        }
    }
}

impl<T: Clone + Send> MemorySink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MemorySinkHandle<T> {
        MemorySinkHandle {
            items: Arc::clone(&self.items),
            flushes: Arc::clone(&self.flushes),
        }
    }

    async fn record(&self, item: T) {
        self.items.lock().await.push(item);
    }

    async fn mark_flushed(&self) {
        *self.flushes.lock().await += 1;
    }
}

#[derive(Clone)]
pub struct MemorySinkHandle<T> {
    items: Arc<Mutex<Vec<T>>>,
    flushes: Arc<Mutex<u32>>,
}

impl<T: Clone> MemorySinkHandle<T> {
    pub async fn items(&self) -> Vec<T> {
        self.items.lock().await.clone()
    }

    pub async fn flush_count(&self) -> u32 {
        *self.flushes.lock().await
    }
}

#[async_trait]
impl EventSink for MemorySink<TrcEvent> {
    async fn write(&mut self, event: &TrcEvent) -> Result<()> {
        self.record(*event).await;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.mark_flushed().await;
        Ok(())
    }
}

#[async_trait]
impl TradeSink for MemorySink<Trade> {
    async fn write(&mut self, trade: &Trade) -> Result<()> {
        self.record(trade.clone()).await;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.mark_flushed().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use crate::test_helpers::base_time;
    use rust_decimal_macros::dec;

    fn out_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trc_sinks_{}_{}", name, std::process::id()))
    }

    #[test]
    fn event_rows_fill_only_their_columns() {
        let bos = event_columns(&EventKind::BosDown {
            level: dec!(98),
            lower_high: Some(dec!(102)),
        });
        assert_eq!(bos, ["98", "", "102", "", "", ""].map(String::from));

        let setup = event_columns(&EventKind::ShortSetup {
            setup_seq: 2,
            zone_low: dec!(97.5),
            zone_high: dec!(103.6),
        });
        assert_eq!(setup, ["", "", "", "2", "97.5", "103.6"].map(String::from));
    }

    #[tokio::test]
    async fn csv_event_sink_writes_header_then_rows() {
        let dir = out_dir("events");
        let path = dir.join("events.csv");
        let mut sink = CsvEventSink::create(&path).await.unwrap();
        sink.write(&TrcEvent::new(
            base_time(),
            EventKind::ChochUp {
                level: dec!(102),
                bar_close: dec!(103.2),
            },
        ))
        .await
        .unwrap();
        sink.flush().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], EVENT_HEADER.join(","));
        assert_eq!(lines[1], "2025-01-01T09:00:00Z,ChochUp,102,103.2,,,,");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn sub_second_event_times_stay_distinct() {
        let dir = out_dir("millis");
        let path = dir.join("events.csv");
        let mut sink = CsvEventSink::create(&path).await.unwrap();
        for ms in [250, 750] {
            sink.write(&TrcEvent::new(
                base_time() + chrono::Duration::milliseconds(ms),
                EventKind::BosUp {
                    level: dec!(1),
                    higher_low: None,
                },
            ))
            .await
            .unwrap();
        }
        sink.flush().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "2025-01-01T09:00:00.250Z,BosUp,1,,,,,");
        assert_eq!(lines[2], "2025-01-01T09:00:00.750Z,BosUp,1,,,,,");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rows_are_on_disk_after_each_flush() {
        let dir = out_dir("flush");
        let path = dir.join("events.csv");
        let mut sink = CsvEventSink::create(&path).await.unwrap();
        let evt = TrcEvent::new(
            base_time(),
            EventKind::BosUp {
                level: dec!(1),
                higher_low: None,
            },
        );

        sink.write(&evt).await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);

        sink.write(&evt).await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn whole_second_times_have_no_fraction() {
        assert_eq!(time_utc(base_time()), "2025-01-01T09:00:00Z");
    }

    #[tokio::test]
    async fn csv_trade_sink_leaves_missing_target_blank() {
        let dir = out_dir("trades");
        let path = dir.join("trades.csv");
        let mut sink = CsvTradeSink::create(&path).await.unwrap();
        sink.write(&Trade {
            trade_id: 1,
            timestamp: base_time(),
            symbol: "ES".into(),
            side: Side::Buy,
            entry_price: dec!(102.0),
            stop_loss: Some(dec!(98.5)),
            take_profit: None,
            setup_seq: 1,
        })
        .await
        .unwrap();
        sink.flush().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], TRADE_HEADER.join(","));
        assert_eq!(lines[1], "1,2025-01-01T09:00:00Z,ES,BUY,102.0,98.5,,1");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn memory_sink_shares_records_through_handle() {
        let mut sink = MemorySink::<TrcEvent>::new();
        let handle = sink.handle();
        let evt = TrcEvent::new(
            base_time(),
            EventKind::BosUp {
                level: dec!(1),
                higher_low: None,
            },
        );
        EventSink::write(&mut sink, &evt).await.unwrap();
        EventSink::flush(&mut sink).await.unwrap();
        assert_eq!(handle.items().await, vec![evt]);
        assert_eq!(handle.flush_count().await, 1);
    }
}
