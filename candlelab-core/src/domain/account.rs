//! Account snapshot and curve point types.

use serde::{Deserialize, Serialize};

use super::time::{iso_millis, TimestampMs};

/// Balance only moves on realized trade closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub starting_balance: f64,
    pub balance: f64,
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
}

impl Account {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            starting_balance,
            balance: starting_balance,
            total_pnl: 0.0,
            total_pnl_percent: 0.0,
        }
    }

    /// Book realized PnL and refresh the derived totals.
    pub(crate) fn realize(&mut self, pnl: f64) {
        self.balance += pnl;
        self.total_pnl = self.balance - self.starting_balance;
        self.total_pnl_percent = if self.starting_balance == 0.0 {
            0.0
        } else {
            self.total_pnl / self.starting_balance * 100.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    #[serde(with = "iso_millis")]
    pub timestamp: TimestampMs,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownCurvePoint {
    #[serde(with = "iso_millis")]
    pub timestamp: TimestampMs,
    pub drawdown_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realize_updates_totals() {
        let mut acct = Account::new(1_000.0);
        acct.realize(50.0);
        acct.realize(-20.0);
        assert_eq!(acct.balance, 1_030.0);
        assert_eq!(acct.total_pnl, 30.0);
        assert!((acct.total_pnl_percent - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_starting_balance_reports_zero_percent() {
        let mut acct = Account::new(0.0);
        acct.realize(10.0);
        assert_eq!(acct.total_pnl, 10.0);
        assert_eq!(acct.total_pnl_percent, 0.0);
    }
}
