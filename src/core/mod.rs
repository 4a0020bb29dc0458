pub mod aggregator;
pub mod engine;
pub mod rolling_mean;
pub mod setup;
pub mod structure;

pub use aggregator::{AggregationError, TimeframeAggregator};
pub use engine::TrcEngine;
pub use rolling_mean::RollingMean;
pub use setup::{RetestZone, Setup, SetupTracker};
pub use structure::{StructureConfig, StructureEngine, StructureState};
