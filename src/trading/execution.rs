use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{Bar, Bias, Direction, Side, Trade, TrcEvent};

/// Trade produced by an execution model, before the runner assigns an id
/// and symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeIntent {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub setup_seq: u64,
}

impl TradeIntent {
    pub fn into_trade(self, trade_id: u64, symbol: &str) -> Trade {
        Trade {
            trade_id,
            timestamp: self.timestamp,
            symbol: symbol.to_string(),
            side: self.side,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            setup_seq: self.setup_seq,
        }
    }
}

/// Turns the events of one bar into trade intents.
pub trait ExecutionModel: Send {
    fn on_events(&self, bar: &Bar, events: &[TrcEvent], bias: Bias) -> Vec<TradeIntent>;
}

/// One market intent per entry event, filled at the entry bar's close.
///
/// The stop sits on the far side of the retest zone. A target is only set
/// when a reward multiple is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaperExecutionModel {
    reward_multiple: Option<Decimal>,
}

impl PaperExecutionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target = entry ± `multiple` × (entry − stop). Non-positive multiples are ignored.
    pub fn with_reward_multiple(mut self, multiple: Decimal) -> Self {
        self.reward_multiple = (multiple > Decimal::ZERO).then_some(multiple);
        self
    }

    fn target(&self, side: Side, entry: Decimal, stop: Decimal) -> Option<Decimal> {
        let multiple = self.reward_multiple?;
        let risk = (entry - stop).abs();
        if risk.is_zero() {
            return None;
        }
        Some(match side {
            Side::Buy => entry + risk * multiple,
            Side::Sell => entry - risk * multiple,
        })
    }
}

impl ExecutionModel for PaperExecutionModel {
    fn on_events(&self, bar: &Bar, events: &[TrcEvent], _bias: Bias) -> Vec<TradeIntent> {
        events
            .iter()
            .filter_map(|evt| {
                let (direction, setup_seq, zone_low, zone_high) = evt.kind.entry()?;
                let side = direction.side();
                let entry = bar.close;
                let stop = match direction {
                    Direction::Long => zone_low,
                    Direction::Short => zone_high,
                };
                Some(TradeIntent {
                    timestamp: evt.timestamp,
                    side,
                    entry_price: entry,
                    stop_loss: Some(stop),
                    take_profit: self.target(side, entry, stop),
                    setup_seq,
                })
            })
            .collect()
    }
}
