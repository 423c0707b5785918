//! Backtest result: the immutable output of one completed run.

use candlelab_core::domain::time::iso_millis;
use candlelab_core::{
    Account, CompletedTrade, DrawdownCurvePoint, EquityCurvePoint, Granularity,
    PerformanceMetrics, Position, SimulationOutput, TimestampMs,
};
use serde::{Deserialize, Serialize};

use crate::data_loader::{DataSource, LoadedCandles};

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a backtest run.
///
/// All timestamps serialize as ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub schema_version: u32,
    pub strategy: String,
    pub symbol: String,
    #[serde(with = "iso_millis")]
    pub start_date: TimestampMs,
    #[serde(with = "iso_millis")]
    pub end_date: TimestampMs,
    pub granularity: Granularity,
    pub account: Account,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<CompletedTrade>,
    pub equity_curve: Vec<EquityCurvePoint>,
    pub drawdown_curve: Vec<DrawdownCurvePoint>,
    /// Position left open at the end of the run (leave-open policy only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_position: Option<Position>,
    pub candle_count: usize,
    pub data_source: DataSource,
    /// BLAKE3 fingerprint of the candles the run consumed.
    pub dataset_hash: String,
}

/// Run identity carried into the result.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHeader {
    pub strategy: String,
    pub symbol: String,
    pub start_date: TimestampMs,
    pub end_date: TimestampMs,
    pub granularity: Granularity,
}

impl BacktestResult {
    /// Reduce a finished simulation into a result.
    pub fn assemble(header: RunHeader, loaded: &LoadedCandles, output: SimulationOutput) -> Self {
        let metrics = PerformanceMetrics::compute(
            &output.trades,
            &output.equity_curve,
            &output.drawdown_curve,
            &output.account,
            header.granularity,
        );

        Self {
            schema_version: SCHEMA_VERSION,
            strategy: header.strategy,
            symbol: header.symbol,
            start_date: header.start_date,
            end_date: header.end_date,
            granularity: header.granularity,
            account: output.account,
            metrics,
            trades: output.trades,
            equity_curve: output.equity_curve,
            drawdown_curve: output.drawdown_curve,
            open_position: output.open_position,
            candle_count: output.candles_processed,
            data_source: loaded.source,
            dataset_hash: loaded.dataset_hash.clone(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.data_source == DataSource::Synthetic
    }
}
