//! Buy-and-hold: go long on the first candle, never exit.

use crate::domain::{Account, Candle, Position};
use crate::strategy::{Signal, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    quantity: f64,
}

impl BuyAndHold {
    pub fn new(quantity: f64) -> Self {
        Self { quantity }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn decide(
        &mut self,
        _candles: &[Candle],
        position: Option<&Position>,
        _account: &Account,
    ) -> Result<Signal, StrategyError> {
        Ok(match position {
            None => Signal::enter_long(self.quantity),
            Some(_) => Signal::Hold,
        })
    }
}
