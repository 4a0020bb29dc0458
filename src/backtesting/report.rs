use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Counters of one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub symbol: String,
    pub bars_processed: u64,
    pub events_written: u64,
    pub trades_written: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunStats {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(50));
        println!("  TRC BACKTEST  {}", self.symbol);
        println!("{}", "=".repeat(50));
        println!("  Bars:        {}", self.bars_processed);
        println!("  Events:      {}", self.events_written);
        println!("  Trades:      {}", self.trades_written);
        println!(
            "  Started:     {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("  Elapsed:     {} ms", self.elapsed().num_milliseconds());
        println!("{}\n", "=".repeat(50));
    }
}

/// Write `summary.json` for a finished run.
///
/// The JSON goes to a sibling temp file, is synced, and is renamed into place,
/// so readers never see a half-written summary.
pub async fn write_summary(path: impl AsRef<Path>, stats: &RunStats) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(stats).context("Failed to serialize run summary")?;
    let tmp = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(json.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    drop(file);
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move summary into {}", path.display()))?;
    Ok(())
}
