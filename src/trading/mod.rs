pub mod execution;

pub use execution::{ExecutionModel, PaperExecutionModel, TradeIntent};
