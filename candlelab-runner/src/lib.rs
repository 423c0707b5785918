//! CandleLab Runner: backtest orchestration on top of `candlelab-core`.
//!
//! - Run configuration and TOML run files
//! - Market-data provider contract and a blocking HTTP provider
//! - Batched candle loading with canonicalization and a synthetic fallback
//! - The single-use [`BacktestEngine`] with an observable status
//! - Result assembly and JSON/CSV export

pub mod config;
pub mod data_loader;
pub mod engine;
pub mod export;
pub mod provider;
pub mod result;

pub use config::{BacktestConfig, ConfigError, ProviderConfig, RunFile, StrategyConfig};
pub use data_loader::{
    load_candles, plan_batches, BatchWindow, DataSource, LoadError, LoadOptions, LoadedCandles,
    DEFAULT_BATCH_CAP,
};
pub use engine::{BacktestEngine, BacktestStatus, ErrorKind, RunError};
pub use export::{export_equity_csv, export_json, export_trades_csv, import_json, save_artifacts};
pub use provider::{
    DataError, HistoryRequest, HttpProvider, HttpProviderConfig, MarketDataProvider,
};
pub use result::{BacktestResult, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_can_move_to_a_worker() {
        assert_send::<BacktestConfig>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<DataError>();
        assert_sync::<DataError>();
    }

    #[test]
    fn providers_are_send_sync() {
        assert_send::<HttpProvider>();
        assert_sync::<HttpProvider>();
        assert_send::<Box<dyn MarketDataProvider>>();
    }
}
