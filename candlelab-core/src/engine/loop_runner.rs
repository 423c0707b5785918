//! Candle-by-candle simulation loop.
//!
//! Per candle `i`:
//! 1. Poll cancellation
//! 2. Hand the strategy `candles[..=i]`, the open position, and the account
//! 3. Apply the signal at the candle's close
//! 4. Mark to market: equity and drawdown points
//! 5. Every `progress_interval` candles, report progress
//!
//! A panic inside `decide` is caught and reported as a strategy error.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::domain::{Candle, ExitReason};
use crate::error::EngineError;
use crate::progress::{CancellationToken, ProgressEvent, ProgressSink};
use crate::strategy::{Signal, Strategy, StrategyError};

use super::ledger::Ledger;
use super::state::{EndOfRunPolicy, EngineConfig, SimulationOutput};

/// Replay `candles` through `strategy`.
///
/// Candles must be strictly increasing in time. A strategy error aborts the
/// run immediately; cancellation discards everything simulated so far.
pub fn run_simulation(
    candles: &[Candle],
    strategy: &mut dyn Strategy,
    config: &EngineConfig,
    cancel: &CancellationToken,
    progress: &mut dyn ProgressSink,
) -> Result<SimulationOutput, EngineError> {
    validate_inputs(candles, config)?;

    let total = candles.len();
    let interval = config.progress_interval.max(1);
    let mut ledger = Ledger::new(config.starting_balance);
    let mut equity_curve = Vec::with_capacity(total);
    let mut drawdown_curve = Vec::with_capacity(total);

    tracing::info!(
        strategy = strategy.name(),
        candles = total,
        starting_balance = config.starting_balance,
        "simulation started"
    );

    for (i, candle) in candles.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(candle_index = i, "simulation cancelled");
            return Err(EngineError::Cancelled);
        }

        let observed = &candles[..=i];
        let decided = panic::catch_unwind(AssertUnwindSafe(|| {
            strategy.decide(observed, ledger.position(), ledger.account())
        }));
        let signal = match decided {
            Ok(Ok(signal)) => signal,
            Ok(Err(error)) => {
                return Err(EngineError::Strategy {
                    strategy: strategy.name().to_string(),
                    candle_index: i,
                    error,
                })
            }
            Err(payload) => {
                let error = StrategyError::new(format!(
                    "strategy panicked: {}",
                    panic_message(payload.as_ref())
                ));
                tracing::error!(candle_index = i, %error, "strategy panicked");
                return Err(EngineError::Strategy {
                    strategy: strategy.name().to_string(),
                    candle_index: i,
                    error,
                });
            }
        };

        apply_signal(&mut ledger, candle, signal, i);

        let (equity_point, drawdown_point) = ledger.mark(candle);
        equity_curve.push(equity_point);
        drawdown_curve.push(drawdown_point);

        if i % interval == 0 {
            progress.report(ProgressEvent::Simulating {
                percent: i as f64 / total as f64 * 100.0,
            });
        }
    }

    let mut open_position = None;
    if let Some(last) = candles.last() {
        match config.end_of_run {
            EndOfRunPolicy::Liquidate => {
                if let Some(trade) = ledger.close(last, ExitReason::EndOfRun) {
                    tracing::info!(
                        exit_price = trade.exit_price,
                        pnl = trade.pnl,
                        "open position liquidated at end of run"
                    );
                }
            }
            EndOfRunPolicy::LeaveOpen => open_position = ledger.position().cloned(),
        }
    }

    progress.report(ProgressEvent::Simulating { percent: 100.0 });

    let (account, _, trades) = ledger.into_parts();
    tracing::info!(
        trades = trades.len(),
        balance = account.balance,
        total_pnl = account.total_pnl,
        "simulation completed"
    );

    Ok(SimulationOutput {
        account,
        trades,
        equity_curve,
        drawdown_curve,
        open_position,
        candles_processed: total,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

fn validate_inputs(candles: &[Candle], config: &EngineConfig) -> Result<(), EngineError> {
    if !config.starting_balance.is_finite() || config.starting_balance < 0.0 {
        return Err(EngineError::Validation(format!(
            "starting balance must be a finite, non-negative amount (got {})",
            config.starting_balance
        )));
    }
    if candles.is_empty() {
        return Err(EngineError::Validation("no candles to simulate".into()));
    }
    if let Some(pair) = candles.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        return Err(EngineError::Validation(format!(
            "candles out of order: {} followed by {}",
            pair[0].timestamp, pair[1].timestamp
        )));
    }
    Ok(())
}

fn apply_signal(ledger: &mut Ledger, candle: &Candle, signal: Signal, index: usize) {
    match signal {
        Signal::Hold => {}
        Signal::Enter { side, quantity } => {
            if !quantity.is_finite() || quantity <= 0.0 {
                tracing::warn!(
                    candle_index = index,
                    quantity,
                    "ignoring entry with invalid quantity"
                );
                return;
            }
            if ledger.open(candle, side, quantity) {
                tracing::debug!(
                    candle_index = index,
                    side = side.as_str(),
                    quantity,
                    price = candle.close,
                    "position opened"
                );
            }
        }
        Signal::Exit => {
            if let Some(trade) = ledger.close(candle, ExitReason::Signal) {
                tracing::debug!(
                    candle_index = index,
                    price = trade.exit_price,
                    pnl = trade.pnl,
                    "position closed"
                );
            }
        }
    }
}
