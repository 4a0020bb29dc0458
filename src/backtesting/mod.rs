pub mod report;
pub mod runner;
pub mod sinks;

pub use report::{write_summary, RunStats};
pub use runner::{BacktestRequest, BacktestRunner, CancelFlag, RunError};
pub use sinks::{CsvEventSink, CsvTradeSink, EventSink, MemorySink, TradeSink};
