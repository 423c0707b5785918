//! Moving average crossover (long only).
//!
//! - Enter long when the fast SMA crosses above the slow SMA
//! - Exit when the fast SMA crosses below the slow SMA

use crate::domain::{Account, Candle, Position};
use crate::strategy::{Signal, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast_period: usize,
    slow_period: usize,
    quantity: f64,
}

impl MaCrossover {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        quantity: f64,
    ) -> Result<Self, StrategyError> {
        if fast_period == 0 {
            return Err(StrategyError::new("fast_period must be > 0"));
        }
        if slow_period <= fast_period {
            return Err(StrategyError::new("slow_period must be > fast_period"));
        }
        Ok(Self {
            fast_period,
            slow_period,
            quantity,
        })
    }

    fn sma(candles: &[Candle], period: usize) -> Option<f64> {
        if candles.len() < period {
            return None;
        }
        let recent = &candles[candles.len() - period..];
        Some(recent.iter().map(|c| c.close).sum::<f64>() / period as f64)
    }

    /// `Some(true)` on a bullish cross, `Some(false)` on a bearish one.
    fn detect_cross(&self, candles: &[Candle]) -> Option<bool> {
        if candles.len() < self.slow_period + 1 {
            return None;
        }
        let fast_now = Self::sma(candles, self.fast_period)?;
        let slow_now = Self::sma(candles, self.slow_period)?;

        let prev = &candles[..candles.len() - 1];
        let fast_prev = Self::sma(prev, self.fast_period)?;
        let slow_prev = Self::sma(prev, self.slow_period)?;

        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(true)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(false)
        } else {
            None
        }
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn decide(
        &mut self,
        candles: &[Candle],
        position: Option<&Position>,
        _account: &Account,
    ) -> Result<Signal, StrategyError> {
        Ok(match (self.detect_cross(candles), position) {
            (Some(true), None) => Signal::enter_long(self.quantity),
            (Some(false), Some(_)) => Signal::Exit,
            _ => Signal::Hold,
        })
    }
}
