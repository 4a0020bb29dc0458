use tracing::debug;

use crate::config::{ConfigError, TrcConfig};
use crate::core::setup::{Setup, SetupTracker};
use crate::core::structure::{StructureConfig, StructureEngine};
use crate::models::{Bar, Bias, Direction, EventKind, TrcEvent};

/// Structure + setup pipeline for one run.
///
/// Per bar: structural event first, then a setup if a CHOCH agrees with the
/// HTF bias, then the retest check. The first bar only bootstraps structure.
pub struct TrcEngine {
    structure: StructureEngine,
    setups: SetupTracker,
    bar_index: u64,
}

impl TrcEngine {
    pub fn new(cfg: TrcConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            structure: StructureEngine::new(StructureConfig {
                require_close_beyond_structure: cfg.require_close_beyond_structure,
            }),
            setups: SetupTracker::new(cfg.max_retest_bars)?,
            bar_index: 0,
        })
    }

    pub fn on_bar(&mut self, bar: &Bar, bias: Bias) -> Vec<TrcEvent> {
        self.bar_index += 1;
        let mut events = Vec::with_capacity(3);

        let structural = self.structure.on_bar(bar);
        if self.bar_index == 1 {
            return events;
        }

        if let Some(evt) = structural {
            debug!("{} {} (bias {})", bar.timestamp, evt.kind, bias);
            events.push(evt);

            if let Some(direction) = Self::setup_direction(&evt.kind, bias) {
                events.push(self.setups.create_setup(bar, direction, self.bar_index));
            }
        }

        if let Some(entry) = self.setups.check_retest(bar, self.bar_index) {
            events.push(entry);
        }

        events
    }

    /// A CHOCH only arms a setup when the HTF bias points the same way.
    fn setup_direction(kind: &EventKind, bias: Bias) -> Option<Direction> {
        match (kind, bias.to_direction()) {
            (EventKind::ChochUp { .. }, Some(Direction::Long)) => Some(Direction::Long),
            (EventKind::ChochDown { .. }, Some(Direction::Short)) => Some(Direction::Short),
            _ => None,
        }
    }

    pub fn bar_index(&self) -> u64 {
        self.bar_index
    }

    pub fn active_setup(&self) -> Option<&Setup> {
        self.setups.active()
    }
}
