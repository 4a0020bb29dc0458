use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, TrcConfig};
use crate::core::{AggregationError, TrcEngine};
use crate::feed::BarSource;
use crate::models::Bar;
use crate::strategies::htf_bias::BiasService;
use crate::trading::ExecutionModel;

use super::report::RunStats;
use super::sinks::{EventSink, TradeSink};

/// Shared stop flag; set it from anywhere to end the run at the next bar boundary.
pub type CancelFlag = Arc<AtomicBool>;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("bar source failed: {0:#}")]
    Source(anyhow::Error),
    #[error("bias service failed: {0}")]
    Bias(#[from] AggregationError),
    #[error("event sink failed: {0:#}")]
    EventSink(anyhow::Error),
    #[error("trade sink failed: {0:#}")]
    TradeSink(anyhow::Error),
    #[error("run cancelled after {bars_processed} bars")]
    Cancelled { bars_processed: u64 },
}

/// Parameters of one run. Bars are kept when `start <= t < end`.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub symbol: String,
    pub trc: TrcConfig,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl BacktestRequest {
    pub fn new(symbol: impl Into<String>, trc: TrcConfig) -> Self {
        Self {
            symbol: symbol.into(),
            trc,
            start: None,
            end: None,
        }
    }

    pub fn with_window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    fn before_window(&self, bar: &Bar) -> bool {
        self.start.is_some_and(|s| bar.timestamp < s)
    }

    fn past_window(&self, bar: &Bar) -> bool {
        self.end.is_some_and(|e| bar.timestamp >= e)
    }
}

/// Drives bars through bias, structure and setup detection, one bar at a time,
/// writing every event and trade intent before the next bar is read.
pub struct BacktestRunner {
    bars: Box<dyn BarSource>,
    bias: Box<dyn BiasService>,
    events: Box<dyn EventSink>,
    trades: Box<dyn TradeSink>,
    execution: Box<dyn ExecutionModel>,
    cancel: CancelFlag,
}

#[derive(Debug, Default)]
struct Counters {
    bars_processed: u64,
    events_written: u64,
    trades_written: u64,
    next_trade_id: u64,
}

impl BacktestRunner {
    pub fn new(
        bars: Box<dyn BarSource>,
        bias: Box<dyn BiasService>,
        events: Box<dyn EventSink>,
        trades: Box<dyn TradeSink>,
        execution: Box<dyn ExecutionModel>,
    ) -> Self {
        Self {
            bars,
            bias,
            events,
            trades,
            execution,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned cancel flag (e.g. one set by a signal handler).
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        Arc::clone(&self.cancel)
    }

    fn check_cancelled(&self, counters: &Counters) -> Result<(), RunError> {
        if self.cancel.load(Ordering::Relaxed) {
            warn!(
                "Run cancelled after {} bars ({} events, {} trades written)",
                counters.bars_processed, counters.events_written, counters.trades_written
            );
            return Err(RunError::Cancelled {
                bars_processed: counters.bars_processed,
            });
        }
        Ok(())
    }

    /// Run to the end of the source or the window. Sinks are flushed only on
    /// a clean finish.
    pub async fn run(&mut self, request: &BacktestRequest) -> Result<RunStats, RunError> {
        let mut engine = TrcEngine::new(request.trc)?;
        let started_at = Utc::now();
        let mut c = Counters {
            next_trade_id: 1,
            ..Counters::default()
        };

        info!("=== TRC BACKTEST START === {}", request.symbol);
        info!(
            "Window: {} to {} | max retest bars {} | close beyond structure {}",
            request
                .start
                .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            request
                .end
                .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            request.trc.max_retest_bars,
            request.trc.require_close_beyond_structure,
        );

        loop {
            self.check_cancelled(&c)?;

            let Some(bar) = self.bars.next_bar().await.map_err(RunError::Source)? else {
                break;
            };
            if request.before_window(&bar) {
                continue;
            }
            if request.past_window(&bar) {
                debug!("{} is past the window end, stopping", bar.timestamp);
                break;
            }

            c.bars_processed += 1;
            let bias = self.bias.on_base_bar(&bar)?;
            let events = engine.on_bar(&bar, bias);

            for evt in &events {
                self.events.write(evt).await.map_err(RunError::EventSink)?;
                c.events_written += 1;
                self.check_cancelled(&c)?;
            }

            for intent in self.execution.on_events(&bar, &events, bias) {
                let trade = intent.into_trade(c.next_trade_id, &request.symbol);
                c.next_trade_id += 1;
                debug!(
                    "Trade #{} {} {} @ {} (setup #{})",
                    trade.trade_id, trade.side, trade.symbol, trade.entry_price, trade.setup_seq
                );
                self.trades.write(&trade).await.map_err(RunError::TradeSink)?;
                c.trades_written += 1;
                self.check_cancelled(&c)?;
            }
        }

        self.events.flush().await.map_err(RunError::EventSink)?;
        self.trades.flush().await.map_err(RunError::TradeSink)?;

        let stats = RunStats {
            symbol: request.symbol.clone(),
            bars_processed: c.bars_processed,
            events_written: c.events_written,
            trades_written: c.trades_written,
            started_at,
            finished_at: Utc::now(),
        };

        info!("=== TRC BACKTEST COMPLETE ===");
        info!(
            "{} bars | {} events | {} trades",
            stats.bars_processed, stats.events_written, stats.trades_written
        );
        Ok(stats)
    }
}
