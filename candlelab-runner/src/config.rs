//! Backtest configuration and TOML run files.
//!
//! [`BacktestConfig`] is the runtime input of a run and owns the strategy.
//! [`RunFile`] is its serializable counterpart: a TOML document with
//! `[backtest]`, `[strategy]` and `[provider]` sections, turned into a
//! `BacktestConfig` by [`RunFile::into_backtest_config`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use candlelab_core::strategies::{BuyAndHold, MaCrossover, ScheduledSignals};
use candlelab_core::{EndOfRunPolicy, EngineConfig, Granularity, Signal, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_loader::{LoadOptions, DEFAULT_BATCH_CAP};
use crate::provider::{HistoryRequest, HttpProviderConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ─── Runtime configuration ──────────────────────────────────────────

/// Everything one backtest run needs.
pub struct BacktestConfig {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
    pub starting_balance: f64,
    pub strategy: Box<dyn Strategy>,
    /// Evaluator names the provider should attach to each candle.
    pub evaluators: Vec<String>,
    pub end_of_run: EndOfRunPolicy,
    pub progress_interval: usize,
}

impl BacktestConfig {
    pub fn new(
        symbol: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        starting_balance: f64,
        strategy: Box<dyn Strategy>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            granularity,
            starting_balance,
            strategy,
            evaluators: Vec::new(),
            end_of_run: EndOfRunPolicy::default(),
            progress_interval: candlelab_core::engine::DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_evaluators(mut self, evaluators: Vec<String>) -> Self {
        self.evaluators = evaluators;
        self
    }

    pub fn with_end_of_run(mut self, policy: EndOfRunPolicy) -> Self {
        self.end_of_run = policy;
        self
    }

    /// Reject configurations no run could satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Validation("symbol must not be empty".into()));
        }
        if self.start >= self.end {
            return Err(ConfigError::Validation(format!(
                "start {} must be before end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        if !self.starting_balance.is_finite() || self.starting_balance < 0.0 {
            return Err(ConfigError::Validation(format!(
                "starting balance must be finite and non-negative (got {})",
                self.starting_balance
            )));
        }
        if self.evaluators.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigError::Validation("evaluator names must not be empty".into()));
        }
        Ok(())
    }

    /// Provider request covering the whole configured window.
    pub fn history_request(&self) -> HistoryRequest {
        HistoryRequest {
            symbol: self.symbol.clone(),
            granularity: self.granularity,
            start_time: self.start.timestamp_millis(),
            end_time: self.end.timestamp_millis(),
            evaluators: self.evaluators.clone(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            starting_balance: self.starting_balance,
            end_of_run: self.end_of_run,
            progress_interval: self.progress_interval,
        }
    }
}

impl fmt::Debug for BacktestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BacktestConfig")
            .field("symbol", &self.symbol)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("granularity", &self.granularity)
            .field("starting_balance", &self.starting_balance)
            .field("strategy", &self.strategy.name())
            .field("evaluators", &self.evaluators)
            .field("end_of_run", &self.end_of_run)
            .finish()
    }
}

// ─── Run file ───────────────────────────────────────────────────────

/// Serializable run description.
///
/// ```toml
/// [backtest]
/// symbol = "BTC-USD"
/// start = "2024-01-01T00:00:00Z"
/// end = "2024-02-01T00:00:00Z"
/// granularity = "ONE_HOUR"
/// starting_balance = 10000.0
///
/// [strategy]
/// type = "ma_crossover"
/// fast_period = 10
/// slow_period = 30
/// quantity = 1.0
///
/// [provider]
/// base_url = "https://data.example.com"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    pub backtest: BacktestSection,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub granularity: Granularity,
    pub starting_balance: f64,
    #[serde(default)]
    pub evaluators: Vec<String>,
    #[serde(default)]
    pub end_of_run: EndOfRunPolicy,
}

/// Strategy selection (serializable enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    BuyAndHold {
        quantity: f64,
    },
    MaCrossover {
        fast_period: usize,
        slow_period: usize,
        quantity: f64,
    },
    /// Fixed signals at fixed candle indices.
    Scheduled {
        #[serde(default)]
        signals: Vec<ScheduledEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub index: usize,
    pub action: ScheduledAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledAction {
    EnterLong,
    EnterShort,
    Exit,
}

impl StrategyConfig {
    /// Instantiate the configured strategy.
    pub fn build(&self) -> Result<Box<dyn Strategy>, ConfigError> {
        match self {
            StrategyConfig::BuyAndHold { quantity } => {
                check_quantity(*quantity)?;
                Ok(Box::new(BuyAndHold::new(*quantity)))
            }
            StrategyConfig::MaCrossover {
                fast_period,
                slow_period,
                quantity,
            } => {
                check_quantity(*quantity)?;
                let strategy = MaCrossover::new(*fast_period, *slow_period, *quantity)
                    .map_err(|e| ConfigError::Validation(e.to_string()))?;
                Ok(Box::new(strategy))
            }
            StrategyConfig::Scheduled { signals } => {
                let mut strategy = ScheduledSignals::new();
                for entry in signals {
                    strategy = strategy.at(entry.index, entry.to_signal()?);
                }
                Ok(Box::new(strategy))
            }
        }
    }
}

impl ScheduledEntry {
    fn to_signal(&self) -> Result<Signal, ConfigError> {
        let quantity = || -> Result<f64, ConfigError> {
            let q = self.quantity.ok_or_else(|| {
                ConfigError::Validation(format!("entry at index {} needs a quantity", self.index))
            })?;
            check_quantity(q)?;
            Ok(q)
        };
        match self.action {
            ScheduledAction::EnterLong => Ok(Signal::enter_long(quantity()?)),
            ScheduledAction::EnterShort => Ok(Signal::enter_short(quantity()?)),
            ScheduledAction::Exit => Ok(Signal::Exit),
        }
    }
}

fn check_quantity(quantity: f64) -> Result<(), ConfigError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "quantity must be positive (got {quantity})"
        )))
    }
}

/// Market-data provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub batch_cap: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Cap on any single retry wait, including `Retry-After`.
    pub max_retry_delay_secs: u64,
    /// Per-request timeout; absent means no timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Fall back to synthetic candles when the provider is unreachable.
    pub allow_synthetic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic_seed: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            batch_cap: DEFAULT_BATCH_CAP,
            max_retries: 3,
            retry_base_delay_ms: 500,
            max_retry_delay_secs: 60,
            timeout_secs: None,
            allow_synthetic: false,
            synthetic_seed: None,
        }
    }
}

impl ProviderConfig {
    pub fn http_config(&self) -> HttpProviderConfig {
        HttpProviderConfig {
            base_url: self.base_url.clone(),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_retry_delay: Duration::from_secs(self.max_retry_delay_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            batch_cap: self.batch_cap,
            allow_synthetic: self.allow_synthetic,
            synthetic_seed: self.synthetic_seed,
        }
    }
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: RunFile = toml::from_str(text)?;
        if file.provider.batch_cap == 0 {
            return Err(ConfigError::Validation("provider.batch_cap must be at least 1".into()));
        }
        Ok(file)
    }

    /// Build and validate the runtime configuration.
    pub fn into_backtest_config(self) -> Result<BacktestConfig, ConfigError> {
        let strategy = self.strategy.build()?;
        let b = self.backtest;
        let config = BacktestConfig::new(
            b.symbol,
            b.start,
            b.end,
            b.granularity,
            b.starting_balance,
            strategy,
        )
        .with_evaluators(b.evaluators)
        .with_end_of_run(b.end_of_run);
        config.validate()?;
        Ok(config)
    }
}
