//! Signals fired at fixed candle indices.
//!
//! Useful for demos and for pinning exact engine behavior in tests.

use std::collections::BTreeMap;

use crate::domain::{Account, Candle, Position};
use crate::strategy::{Signal, Strategy, StrategyError};

#[derive(Debug, Clone, Default)]
pub struct ScheduledSignals {
    schedule: BTreeMap<usize, Signal>,
}

impl ScheduledSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `signal` when the candle at `index` is current.
    pub fn at(mut self, index: usize, signal: Signal) -> Self {
        self.schedule.insert(index, signal);
        self
    }
}

impl FromIterator<(usize, Signal)> for ScheduledSignals {
    fn from_iter<I: IntoIterator<Item = (usize, Signal)>>(iter: I) -> Self {
        Self {
            schedule: iter.into_iter().collect(),
        }
    }
}

impl Strategy for ScheduledSignals {
    fn name(&self) -> &str {
        "scheduled"
    }

    fn decide(
        &mut self,
        candles: &[Candle],
        _position: Option<&Position>,
        _account: &Account,
    ) -> Result<Signal, StrategyError> {
        let index = candles.len().saturating_sub(1);
        Ok(self.schedule.get(&index).copied().unwrap_or(Signal::Hold))
    }
}
