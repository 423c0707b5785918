//! Strategy contract: the single decision point the engine consumes.
//!
//! # Invariants
//! - `decide()` receives the candles observed so far, the last one being the
//!   current candle. It never sees a later candle.
//! - The engine applies the returned [`Signal`] at the current candle's close.
//! - A returned error aborts the run; it is reported with its message intact.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Account, Candle, Position, PositionSide};

/// What the strategy wants done at the current candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Hold,
    Enter { side: PositionSide, quantity: f64 },
    Exit,
}

impl Signal {
    pub fn enter_long(quantity: f64) -> Self {
        Signal::Enter {
            side: PositionSide::Long,
            quantity,
        }
    }

    pub fn enter_short(quantity: f64) -> Self {
        Signal::Enter {
            side: PositionSide::Short,
            quantity,
        }
    }
}

/// Failure raised by a strategy implementation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct StrategyError {
    message: String,
}

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Pluggable trading logic.
pub trait Strategy: Send {
    /// Name recorded on the backtest result.
    fn name(&self) -> &str;

    /// Decide on the current candle (`candles.last()`).
    fn decide(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        account: &Account,
    ) -> Result<Signal, StrategyError>;
}

/// Strategy backed by a closure.
pub struct FnStrategy<F> {
    name: String,
    decide: F,
}

impl<F> FnStrategy<F>
where
    F: FnMut(&[Candle], Option<&Position>, &Account) -> Result<Signal, StrategyError> + Send,
{
    pub fn new(name: impl Into<String>, decide: F) -> Self {
        Self {
            name: name.into(),
            decide,
        }
    }
}

impl<F> Strategy for FnStrategy<F>
where
    F: FnMut(&[Candle], Option<&Position>, &Account) -> Result<Signal, StrategyError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        account: &Account,
    ) -> Result<Signal, StrategyError> {
        (self.decide)(candles, position, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_serializes_tagged() {
        let json = serde_json::to_value(Signal::enter_short(2.0)).unwrap();
        assert_eq!(json["type"], "ENTER");
        assert_eq!(json["side"], "short");
        assert_eq!(json["quantity"], 2.0);

        let hold: Signal = serde_json::from_str(r#"{"type":"HOLD"}"#).unwrap();
        assert_eq!(hold, Signal::Hold);
    }

    #[test]
    fn strategy_error_displays_message_verbatim() {
        let err = StrategyError::new("indicator buffer underflow");
        assert_eq!(err.to_string(), "indicator buffer underflow");
    }

    #[test]
    fn closure_strategy_delegates() {
        let mut calls = 0;
        let mut s = FnStrategy::new("counter", move |candles: &[Candle], _, _| {
            calls += 1;
            Ok(if candles.len() == 1 && calls == 1 {
                Signal::enter_long(1.0)
            } else {
                Signal::Hold
            })
        });
        let candle = Candle::new(0, 1.0, 1.0, 1.0, 1.0, 0.0);
        let acct = Account::new(100.0);
        assert_eq!(s.name(), "counter");
        assert_eq!(
            s.decide(std::slice::from_ref(&candle), None, &acct).unwrap(),
            Signal::enter_long(1.0)
        );
        assert_eq!(
            s.decide(std::slice::from_ref(&candle), None, &acct).unwrap(),
            Signal::Hold
        );
    }
}
