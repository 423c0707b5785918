//! CandleLab Core: candle replay engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (candles, granularity, positions, trades, account, curves)
//! - The [`Strategy`] contract and a few reference strategies
//! - The account ledger and the candle-by-candle simulation loop
//! - Performance metrics derived from a finished run
//! - Progress notifications and cooperative cancellation

pub mod domain;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod progress;
pub mod strategies;
pub mod strategy;

pub use domain::{
    Account, Candle, CompletedTrade, DrawdownCurvePoint, EquityCurvePoint, ExitReason,
    Granularity, Position, PositionSide, TimestampMs,
};
pub use engine::{run_simulation, EndOfRunPolicy, EngineConfig, RunState, SimulationOutput};
pub use error::{EngineError, CANCELLED_MESSAGE};
pub use metrics::PerformanceMetrics;
pub use progress::{CancellationToken, ChannelProgress, NoProgress, ProgressEvent, ProgressSink};
pub use strategy::{FnStrategy, Signal, Strategy, StrategyError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything that crosses the worker boundary is Send.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Candle>();
        require_sync::<Candle>();
        require_send::<CompletedTrade>();
        require_sync::<CompletedTrade>();
        require_send::<SimulationOutput>();
        require_sync::<SimulationOutput>();
        require_send::<PerformanceMetrics>();
        require_sync::<PerformanceMetrics>();
        require_send::<EngineError>();
        require_sync::<EngineError>();
        require_send::<CancellationToken>();
        require_sync::<CancellationToken>();
        require_send::<ProgressEvent>();
        require_send::<Box<dyn Strategy>>();
    }
}
