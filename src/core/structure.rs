use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Bar, EventKind, TrcEvent, Trend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureConfig {
    /// CHOCH needs a close beyond the pivot; `false` lets the wick trigger it.
    pub require_close_beyond_structure: bool,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            require_close_beyond_structure: true,
        }
    }
}

/// Incremental market-structure state. `None` pivots are simply not set yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureState {
    pub trend: Trend,

    // Impulse extremes
    pub last_impulse_high: Option<Decimal>,
    pub last_impulse_low: Option<Decimal>,

    // Confirmed pivots (CHOCH triggers)
    pub confirmed_higher_low: Option<Decimal>,
    pub confirmed_lower_high: Option<Decimal>,

    // Pullback candidates awaiting the next impulse
    pub pending_pullback_low: Option<Decimal>,
    pub pending_pullback_high: Option<Decimal>,
}

/// BOS/CHOCH state machine over the base-timeframe bars.
///
/// - Bull: a new impulse high is a BOS up and confirms the lowest low since
///   the previous impulse as the higher-low. A close below that higher-low is
///   a CHOCH down.
/// - Bear: the mirror image, with lower-highs and CHOCH up.
///
/// The first bar only seeds the state. At most one event per bar.
pub struct StructureEngine {
    cfg: StructureConfig,
    state: StructureState,
}

impl StructureEngine {
    pub fn new(cfg: StructureConfig) -> Self {
        Self {
            cfg,
            state: StructureState::default(),
        }
    }

    pub fn state(&self) -> &StructureState {
        &self.state
    }

    pub fn trend(&self) -> Trend {
        self.state.trend
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<TrcEvent> {
        match self.state.trend {
            Trend::Unknown => {
                self.bootstrap(bar);
                None
            }
            Trend::Bull => self.update_bull(bar),
            Trend::Bear => self.update_bear(bar),
        }
    }

    fn bootstrap(&mut self, bar: &Bar) {
        let s = &mut self.state;
        s.last_impulse_high = Some(bar.high);
        s.last_impulse_low = Some(bar.low);
        s.pending_pullback_low = Some(bar.low);
        s.pending_pullback_high = Some(bar.high);
        s.trend = if bar.closes_up() {
            Trend::Bull
        } else {
            Trend::Bear
        };
    }

    fn update_bull(&mut self, bar: &Bar) -> Option<TrcEvent> {
        if let Some(higher_low) = self.state.confirmed_higher_low {
            let reach = if self.cfg.require_close_beyond_structure {
                bar.close
            } else {
                bar.low
            };
            if reach < higher_low {
                let s = &mut self.state;
                s.trend = Trend::Bear;
                s.last_impulse_high = Some(bar.high);
                s.last_impulse_low = Some(bar.low);
                s.pending_pullback_high = Some(bar.high);
                s.pending_pullback_low = None;
                s.confirmed_lower_high = Some(bar.high);

                return Some(TrcEvent::new(
                    bar.timestamp,
                    EventKind::ChochDown {
                        level: higher_low,
                        bar_close: bar.close,
                    },
                ));
            }
        }

        let s = &mut self.state;
        let pullback = s.pending_pullback_low.map_or(bar.low, |p| p.min(bar.low));
        s.pending_pullback_low = Some(pullback);

        let new_high = s.last_impulse_high.map_or(true, |h| bar.high > h);
        if !new_high {
            return None;
        }

        s.last_impulse_high = Some(bar.high);
        s.confirmed_higher_low = Some(pullback);
        s.pending_pullback_low = Some(bar.low);

        Some(TrcEvent::new(
            bar.timestamp,
            EventKind::BosUp {
                level: bar.high,
                higher_low: s.confirmed_higher_low,
            },
        ))
    }

    fn update_bear(&mut self, bar: &Bar) -> Option<TrcEvent> {
        if let Some(lower_high) = self.state.confirmed_lower_high {
            let reach = if self.cfg.require_close_beyond_structure {
                bar.close
            } else {
                bar.high
            };
            if reach > lower_high {
                let s = &mut self.state;
                s.trend = Trend::Bull;
                s.last_impulse_high = Some(bar.high);
                s.last_impulse_low = Some(bar.low);
                s.pending_pullback_low = Some(bar.low);
                s.pending_pullback_high = None;
                s.confirmed_higher_low = Some(bar.low);

                return Some(TrcEvent::new(
                    bar.timestamp,
                    EventKind::ChochUp {
                        level: lower_high,
                        bar_close: bar.close,
                    },
                ));
            }
        }

        let s = &mut self.state;
        let pullback = s.pending_pullback_high.map_or(bar.high, |p| p.max(bar.high));
        s.pending_pullback_high = Some(pullback);

        let new_low = s.last_impulse_low.map_or(true, |l| bar.low < l);
        if !new_low {
            return None;
        }

        s.last_impulse_low = Some(bar.low);
        s.confirmed_lower_high = Some(pullback);
        s.pending_pullback_high = Some(bar.high);

        Some(TrcEvent::new(
            bar.timestamp,
            EventKind::BosDown {
                level: bar.low,
                lower_high: s.confirmed_lower_high,
            },
        ))
    }
}
