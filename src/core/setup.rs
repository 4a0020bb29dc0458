use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::models::{Bar, Direction, EventKind, TrcEvent};

/// Closed price interval a retest has to trade back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetestZone {
    low: Decimal,
    high: Decimal,
}

impl RetestZone {
    /// Panics if `low > high`; callers always pass ordered bounds.
    pub fn new(low: Decimal, high: Decimal) -> Self {
        assert!(
            low <= high,
            "retest zone inverted: low {} > high {}",
            low,
            high
        );
        Self { low, high }
    }

    /// Zone spanned by a CHOCH bar: low..close for longs, close..high for shorts.
    pub fn from_bar(bar: &Bar, direction: Direction) -> Self {
        let edge = match direction {
            Direction::Long => bar.low,
            Direction::Short => bar.high,
        };
        Self::new(bar.close.min(edge), bar.close.max(edge))
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn contains(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub direction: Direction,
    pub zone: RetestZone,
    pub bars_remaining: u32,
    pub sequence: u64,
    pub origin_bar_index: u64,
}

impl Setup {
    fn event_kind(&self) -> EventKind {
        let (setup_seq, zone_low, zone_high) = (self.sequence, self.zone.low(), self.zone.high());
        match self.direction {
            Direction::Long => EventKind::LongSetup {
                setup_seq,
                zone_low,
                zone_high,
            },
            Direction::Short => EventKind::ShortSetup {
                setup_seq,
                zone_low,
                zone_high,
            },
        }
    }

    fn entry_kind(&self) -> EventKind {
        let (setup_seq, zone_low, zone_high) = (self.sequence, self.zone.low(), self.zone.high());
        match self.direction {
            Direction::Long => EventKind::LongEntry {
                setup_seq,
                zone_low,
                zone_high,
            },
            Direction::Short => EventKind::ShortEntry {
                setup_seq,
                zone_low,
                zone_high,
            },
        }
    }

    /// Longs retest with the low, shorts with the high.
    fn is_hit(&self, bar: &Bar) -> bool {
        match self.direction {
            Direction::Long => self.zone.contains(bar.low),
            Direction::Short => self.zone.contains(bar.high),
        }
    }
}

/// Tracks the single active retest setup opened after a qualifying CHOCH.
pub struct SetupTracker {
    max_retest_bars: u32,
    next_sequence: u64,
    active: Option<Setup>,
}

impl SetupTracker {
    pub fn new(max_retest_bars: u32) -> Result<Self, ConfigError> {
        if max_retest_bars == 0 {
            return Err(ConfigError::NonPositiveRetestBars(max_retest_bars));
        }
        Ok(Self {
            max_retest_bars,
            next_sequence: 1,
            active: None,
        })
    }

    pub fn active(&self) -> Option<&Setup> {
        self.active.as_ref()
    }

    /// Arm a new setup from the CHOCH bar, replacing any active one.
    /// Returns the `LongSetup`/`ShortSetup` event describing it.
    pub fn create_setup(&mut self, bar: &Bar, direction: Direction, bar_index: u64) -> TrcEvent {
        if let Some(old) = &self.active {
            debug!(
                "Setup #{} ({}) replaced with {} bars left",
                old.sequence, old.direction, old.bars_remaining
            );
        }

        let setup = Setup {
            direction,
            zone: RetestZone::from_bar(bar, direction),
            bars_remaining: self.max_retest_bars,
            sequence: self.next_sequence,
            origin_bar_index: bar_index,
        };
        self.next_sequence += 1;
        self.active = Some(setup);

        debug!(
            "Setup #{} {} zone [{}, {}] armed for {} bars",
            setup.sequence,
            direction,
            setup.zone.low(),
            setup.zone.high(),
            setup.bars_remaining
        );

        TrcEvent::new(bar.timestamp, setup.event_kind())
    }

    /// Spend one bar of the budget and test for a retest of the zone.
    pub fn check_retest(&mut self, bar: &Bar, bar_index: u64) -> Option<TrcEvent> {
        let setup = self.active.as_mut()?;
        if setup.bars_remaining == 0 {
            return None;
        }

        // The CHOCH bar itself neither fills nor spends budget.
        if bar_index <= setup.origin_bar_index {
            return None;
        }

        // Decrement first: a budget of 1 leaves only the next bar eligible.
        setup.bars_remaining -= 1;

        if setup.is_hit(bar) {
            let evt = TrcEvent::new(bar.timestamp, setup.entry_kind());
            debug!("Setup #{} {} retested", setup.sequence, setup.direction);
            self.active = None;
            return Some(evt);
        }

        if setup.bars_remaining == 0 {
            debug!("Setup #{} {} expired", setup.sequence, setup.direction);
            self.active = None;
        }
        None
    }
}
