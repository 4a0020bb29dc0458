pub mod csv_source;
pub mod historical;

pub use csv_source::CsvBarSource;
pub use historical::HistoricalBarSource;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Bar;

/// Finite, single-pass stream of base-timeframe bars in timestamp order.
#[async_trait]
pub trait BarSource: Send {
    /// Next bar, or `None` once the stream is exhausted.
    async fn next_bar(&mut self) -> Result<Option<Bar>>;
}
