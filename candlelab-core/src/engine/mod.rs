//! Backtesting engine: candle loop, ledger, and run state.

mod ledger;
pub mod loop_runner;
pub mod state;

pub use ledger::drawdown_percent;
pub use loop_runner::run_simulation;
pub use state::{
    EndOfRunPolicy, EngineConfig, RunState, SimulationOutput, DEFAULT_PROGRESS_INTERVAL,
};
