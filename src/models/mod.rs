pub mod bar;
pub mod direction;
pub mod event;
pub mod timeframe;
pub mod trade;

pub use bar::Bar;
pub use direction::*;
pub use event::{EventKind, TrcEvent};
pub use timeframe::Timeframe;
pub use trade::Trade;
