use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;

use crate::feed::BarSource;
use crate::models::Bar;

/// Replays pre-loaded bars oldest-first. Each bar is handed out once.
#[derive(Debug, Clone, Default)]
pub struct HistoricalBarSource {
    bars: VecDeque<Bar>,
}

impl HistoricalBarSource {
    /// Bars must be sorted oldest-first.
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars: bars.into() }
    }
}

#[async_trait]
impl BarSource for HistoricalBarSource {
    async fn next_bar(&mut self) -> Result<Option<Bar>> {
        Ok(self.bars.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_bars;

    #[tokio::test]
    async fn replays_once_in_order() {
        let bars = make_bars(&[(1.0, 2.0, 0.5, 1.5), (1.5, 2.5, 1.0, 2.0)]);
        let mut src = HistoricalBarSource::new(bars.clone());

        assert_eq!(src.next_bar().await.unwrap(), Some(bars[0]));
        assert_eq!(src.next_bar().await.unwrap(), Some(bars[1]));
        assert_eq!(src.next_bar().await.unwrap(), None);
        assert_eq!(src.next_bar().await.unwrap(), None);
    }
}
