//! Performance metrics: pure reductions over the trade list and curves.
//!
//! Every metric is a pure function computed once after a run. Degenerate
//! inputs (no trades, flat equity, a single candle) produce 0, never NaN or
//! infinity.

use serde::{Deserialize, Serialize};

use crate::domain::{Account, CompletedTrade, DrawdownCurvePoint, EquityCurvePoint, Granularity};

/// Profit factor reported when there are winners but no losers.
const PROFIT_FACTOR_CAP: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub losing_trades: usize,
    /// Fraction of trades with positive PnL, in `[0, 1]`.
    pub win_rate: f64,
    /// Percent return on the starting balance.
    pub total_return: f64,
    /// Largest drawdown in percent.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub average_trade_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub average_duration_ms: f64,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    pub fn compute(
        trades: &[CompletedTrade],
        equity_curve: &[EquityCurvePoint],
        drawdown_curve: &[DrawdownCurvePoint],
        account: &Account,
        granularity: Granularity,
    ) -> Self {
        let profitable_trades = trades.iter().filter(|t| t.is_winner()).count();
        let losing_trades = trades.iter().filter(|t| t.pnl < 0.0).count();
        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();

        Self {
            total_trades: trades.len(),
            profitable_trades,
            losing_trades,
            win_rate: win_rate(trades),
            total_return: account.total_pnl_percent,
            max_drawdown: max_drawdown(drawdown_curve),
            sharpe_ratio: sharpe_ratio(&equity, granularity.periods_per_year()),
            profit_factor: profit_factor(trades),
            average_trade_pnl: average(trades.iter().map(|t| t.pnl)),
            largest_win: trades.iter().map(|t| t.pnl).fold(0.0, f64::max),
            largest_loss: trades.iter().map(|t| t.pnl).fold(0.0, f64::min),
            average_duration_ms: average(trades.iter().map(|t| t.duration_ms as f64)),
            max_consecutive_losses: max_consecutive_losses(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn win_rate(trades: &[CompletedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Maximum of the drawdown curve, 0 when empty.
pub fn max_drawdown(drawdown_curve: &[DrawdownCurvePoint]) -> f64 {
    drawdown_curve
        .iter()
        .map(|d| d.drawdown_percent)
        .fold(0.0, f64::max)
}

/// Annualized Sharpe ratio of per-candle equity returns.
///
/// Sharpe = mean(r) / stdev(r) * sqrt(periods_per_year), with the sample
/// standard deviation. Fewer than two returns or zero deviation give 0.
pub fn sharpe_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * periods_per_year.sqrt()
}

/// Gross profit over gross loss, capped for the no-loss case.
pub fn profit_factor(trades: &[CompletedTrade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

pub fn max_consecutive_losses(trades: &[CompletedTrade]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() {
            current = 0;
        } else {
            current += 1;
            max_streak = max_streak.max(current);
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Fractional change between consecutive equity values.
///
/// Steps from a non-positive equity are skipped.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
