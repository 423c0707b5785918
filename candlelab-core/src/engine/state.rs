//! Engine configuration, run state, and the raw simulation output.

use serde::{Deserialize, Serialize};

use crate::domain::{Account, CompletedTrade, DrawdownCurvePoint, EquityCurvePoint, Position};

/// Lifecycle of a single backtest run.
///
/// `Idle -> Loading -> Running -> {Completed | Cancelled | Failed}`; the three
/// outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Loading,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled | RunState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Idle, Running)
                | (Loading, Running)
                | (Loading, Cancelled)
                | (Loading, Failed)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Running, Failed)
        )
    }
}

/// What to do with a position still open after the last candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfRunPolicy {
    /// Close at the final candle's close and record an `EndOfRun` trade.
    #[default]
    Liquidate,
    /// Report the position as still open; its PnL stays unrealized.
    LeaveOpen,
}

/// Default number of candles between progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub starting_balance: f64,
    #[serde(default)]
    pub end_of_run: EndOfRunPolicy,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_progress_interval() -> usize {
    DEFAULT_PROGRESS_INTERVAL
}

impl EngineConfig {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            starting_balance,
            end_of_run: EndOfRunPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_end_of_run(mut self, policy: EndOfRunPolicy) -> Self {
        self.end_of_run = policy;
        self
    }
}

/// Everything the bar loop produces, before metrics are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub account: Account,
    pub trades: Vec<CompletedTrade>,
    pub equity_curve: Vec<EquityCurvePoint>,
    pub drawdown_curve: Vec<DrawdownCurvePoint>,
    /// Only populated under [`EndOfRunPolicy::LeaveOpen`].
    pub open_position: Option<Position>,
    pub candles_processed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for from in [RunState::Completed, RunState::Cancelled, RunState::Failed] {
            for to in [
                RunState::Idle,
                RunState::Loading,
                RunState::Running,
                RunState::Completed,
            ] {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn happy_path_is_legal() {
        assert!(RunState::Idle.can_transition_to(RunState::Loading));
        assert!(RunState::Loading.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Completed));
        assert!(!RunState::Idle.can_transition_to(RunState::Completed));
    }
}
