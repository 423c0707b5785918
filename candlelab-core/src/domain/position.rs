//! Open position state for the single-position model.

use serde::{Deserialize, Serialize};

use super::time::{iso_millis, TimestampMs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }
}

/// An open, not-yet-closed simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(with = "iso_millis")]
    pub entry_time: TimestampMs,
    pub entry_price: f64,
    pub side: PositionSide,
    pub quantity: f64,
}

impl Position {
    /// Mark-to-market PnL against `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity * self.side.sign()
    }

    /// Capital notionally committed at entry.
    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: PositionSide) -> Position {
        Position {
            entry_time: 0,
            entry_price: 100.0,
            side,
            quantity: 2.0,
        }
    }

    #[test]
    fn long_gains_when_price_rises() {
        assert_eq!(position(PositionSide::Long).unrealized_pnl(110.0), 20.0);
        assert_eq!(position(PositionSide::Long).unrealized_pnl(95.0), -10.0);
    }

    #[test]
    fn short_gains_when_price_falls() {
        assert_eq!(position(PositionSide::Short).unrealized_pnl(90.0), 20.0);
        assert_eq!(position(PositionSide::Short).unrealized_pnl(105.0), -10.0);
    }

    #[test]
    fn side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PositionSide::Short).unwrap(), "\"short\"");
    }
}
