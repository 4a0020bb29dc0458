use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::{Bar, Timeframe};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("bar at {bar} falls before the open {period} period starting {current}")]
    OutOfOrder {
        bar: DateTime<Utc>,
        current: DateTime<Utc>,
        period: String,
    },
}

/// Folds base bars into one coarser timeframe, emitting a candle per rollover.
///
/// Periods are aligned to the UTC epoch. A trailing partial candle is never
/// emitted by `on_base_bar`; read it with [`TimeframeAggregator::partial`].
#[derive(Debug, Clone)]
pub struct TimeframeAggregator {
    period_ms: i64,
    label: String,
    current: Option<Bar>,
}

impl TimeframeAggregator {
    pub fn new(period: Duration) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::NonPositivePeriod(period));
        }
        // Period starts are floored on epoch milliseconds.
        if period.subsec_nanos() % 1_000_000 != 0 {
            return Err(ConfigError::FractionalMillisPeriod(period));
        }
        let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
        Ok(Self {
            period_ms,
            label: format!("{}s", period.as_secs()),
            current: None,
        })
    }

    pub fn for_timeframe(tf: Timeframe) -> Result<Self, ConfigError> {
        let mut agg = Self::new(tf.as_duration())?;
        agg.label = tf.to_string();
        Ok(agg)
    }

    /// Feed one base bar; returns the finished candle when its period rolled over.
    pub fn on_base_bar(&mut self, bar: &Bar) -> Result<Option<Bar>, AggregationError> {
        let period_start = self.period_start(bar.timestamp);

        let Some(current) = self.current.as_mut() else {
            self.current = Some(Self::seed(period_start, bar));
            return Ok(None);
        };

        if period_start == current.timestamp {
            current.merge(bar);
            return Ok(None);
        }

        if period_start < current.timestamp {
            return Err(AggregationError::OutOfOrder {
                bar: bar.timestamp,
                current: current.timestamp,
                period: self.label.clone(),
            });
        }

        let completed = *current;
        self.current = Some(Self::seed(period_start, bar));
        Ok(Some(completed))
    }

    /// The candle still being accumulated, if any.
    pub fn partial(&self) -> Option<Bar> {
        self.current
    }

    pub fn period_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let ms = ts.timestamp_millis();
        let floored = ms - ms.rem_euclid(self.period_ms);
        DateTime::from_timestamp_millis(floored).unwrap_or(ts)
    }

    fn seed(period_start: DateTime<Utc>, bar: &Bar) -> Bar {
        Bar {
            timestamp: period_start,
            ..*bar
        }
    }
}
