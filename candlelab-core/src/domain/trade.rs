//! CompletedTrade: a closed round trip, appended to the trade list on exit.

use serde::{Deserialize, Serialize};

use super::position::{Position, PositionSide};
use super::time::{iso_millis, TimestampMs};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The strategy returned `Exit`.
    Signal,
    /// Force-liquidated at the final candle's close.
    EndOfRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrade {
    #[serde(with = "iso_millis")]
    pub entry_time: TimestampMs,
    #[serde(with = "iso_millis")]
    pub exit_time: TimestampMs,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub duration_ms: i64,
    pub exit_reason: ExitReason,
}

impl CompletedTrade {
    /// Close `position` at `exit_price`.
    ///
    /// `pnl_percent` is relative to entry notional and is 0 when that notional is 0.
    pub fn close(
        position: &Position,
        exit_time: TimestampMs,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let pnl = position.unrealized_pnl(exit_price);
        let notional = position.entry_notional();
        let pnl_percent = if notional == 0.0 {
            0.0
        } else {
            pnl / notional * 100.0
        };

        Self {
            entry_time: position.entry_time,
            exit_time,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            pnl,
            pnl_percent,
            duration_ms: exit_time - position.entry_time,
            exit_reason,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
