use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Direction;

/// Payload of an emitted event, one variant per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// New impulse high in a bull leg. `higher_low` is the pivot confirmed by it.
    BosUp {
        level: Decimal,
        higher_low: Option<Decimal>,
    },
    /// New impulse low in a bear leg. `lower_high` is the pivot confirmed by it.
    BosDown {
        level: Decimal,
        lower_high: Option<Decimal>,
    },
    /// Close above the last lower-high (`level`) flipped the trend to bull.
    ChochUp { level: Decimal, bar_close: Decimal },
    /// Close below the last higher-low (`level`) flipped the trend to bear.
    ChochDown { level: Decimal, bar_close: Decimal },
    LongSetup {
        setup_seq: u64,
        zone_low: Decimal,
        zone_high: Decimal,
    },
    ShortSetup {
        setup_seq: u64,
        zone_low: Decimal,
        zone_high: Decimal,
    },
    LongEntry {
        setup_seq: u64,
        zone_low: Decimal,
        zone_high: Decimal,
    },
    ShortEntry {
        setup_seq: u64,
        zone_low: Decimal,
        zone_high: Decimal,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::BosUp { .. } => "BosUp",
            EventKind::BosDown { .. } => "BosDown",
            EventKind::ChochUp { .. } => "ChochUp",
            EventKind::ChochDown { .. } => "ChochDown",
            EventKind::LongSetup { .. } => "LongSetup",
            EventKind::ShortSetup { .. } => "ShortSetup",
            EventKind::LongEntry { .. } => "LongEntry",
            EventKind::ShortEntry { .. } => "ShortEntry",
        }
    }

    /// Direction, setup sequence and zone bounds of an entry event.
    pub fn entry(&self) -> Option<(Direction, u64, Decimal, Decimal)> {
        match *self {
            EventKind::LongEntry {
                setup_seq,
                zone_low,
                zone_high,
            } => Some((Direction::Long, setup_seq, zone_low, zone_high)),
            EventKind::ShortEntry {
                setup_seq,
                zone_low,
                zone_high,
            } => Some((Direction::Short, setup_seq, zone_low, zone_high)),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrcEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TrcEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}
