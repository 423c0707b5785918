//! Account ledger: bookkeeping for balance, the open position, and closed trades.
//!
//! Only the bar loop drives the ledger. Opening a position reserves nothing;
//! the balance changes exclusively when a trade is closed.

use crate::domain::{
    Account, Candle, CompletedTrade, DrawdownCurvePoint, EquityCurvePoint, ExitReason, Position,
    PositionSide,
};

#[derive(Debug, Clone)]
pub(crate) struct Ledger {
    account: Account,
    position: Option<Position>,
    trades: Vec<CompletedTrade>,
    peak_equity: Option<f64>,
}

impl Ledger {
    pub(crate) fn new(starting_balance: f64) -> Self {
        Self {
            account: Account::new(starting_balance),
            position: None,
            trades: Vec::new(),
            peak_equity: None,
        }
    }

    pub(crate) fn account(&self) -> &Account {
        &self.account
    }

    pub(crate) fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Open at the candle's close. Returns false if a position is already open.
    pub(crate) fn open(&mut self, candle: &Candle, side: PositionSide, quantity: f64) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.position = Some(Position {
            entry_time: candle.timestamp,
            entry_price: candle.close,
            side,
            quantity,
        });
        true
    }

    /// Close at the candle's close and book the realized PnL.
    pub(crate) fn close(&mut self, candle: &Candle, reason: ExitReason) -> Option<&CompletedTrade> {
        let position = self.position.take()?;
        let trade = CompletedTrade::close(&position, candle.timestamp, candle.close, reason);
        self.account.realize(trade.pnl);
        self.trades.push(trade);
        self.trades.last()
    }

    pub(crate) fn unrealized_pnl(&self, price: f64) -> f64 {
        self.position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_pnl(price))
    }

    pub(crate) fn equity(&self, price: f64) -> f64 {
        self.account.balance + self.unrealized_pnl(price)
    }

    /// Mark to market at the candle's close and advance the running peak.
    pub(crate) fn mark(&mut self, candle: &Candle) -> (EquityCurvePoint, DrawdownCurvePoint) {
        let equity = self.equity(candle.close);
        let peak = self.peak_equity.map_or(equity, |p| p.max(equity));
        self.peak_equity = Some(peak);

        (
            EquityCurvePoint {
                timestamp: candle.timestamp,
                equity,
            },
            DrawdownCurvePoint {
                timestamp: candle.timestamp,
                drawdown_percent: drawdown_percent(peak, equity),
            },
        )
    }

    pub(crate) fn into_parts(self) -> (Account, Option<Position>, Vec<CompletedTrade>) {
        (self.account, self.position, self.trades)
    }
}

/// Decline from `peak`, in percent, clamped to `[0, 100]`.
///
/// A non-positive peak has no meaningful drawdown and reports 0.
pub fn drawdown_percent(peak: f64, equity: f64) -> f64 {
    if peak <= 0.0 {
        return 0.0;
    }
    ((peak - equity) / peak * 100.0).clamp(0.0, 100.0)
}
