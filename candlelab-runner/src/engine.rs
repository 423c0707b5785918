//! Single-use backtest engine with an observable status.
//!
//! One [`BacktestEngine`] drives exactly one run through
//! `Idle -> Loading -> Running -> {Completed | Cancelled | Failed}`.
//! A second `run` on the same instance, including a concurrent one, is
//! rejected with [`EngineError::AlreadyStarted`]. Failures never escape as
//! panics: they end the run in a terminal state whose `error` carries the
//! message, and are also returned to the caller.

use std::sync::{Mutex, MutexGuard, PoisonError};

use candlelab_core::{
    run_simulation, CancellationToken, EngineError, ProgressEvent, ProgressSink, RunState,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_candles, LoadError, LoadOptions, LoadedCandles};
use crate::provider::MarketDataProvider;
use crate::result::{BacktestResult, RunHeader};

/// Coarse error classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Cancellation,
    Strategy,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Config(_) => ErrorKind::Validation,
            RunError::Load(LoadError::Validation(_)) => ErrorKind::Validation,
            RunError::Load(LoadError::Batch { .. }) => ErrorKind::Network,
            RunError::Load(LoadError::Cancelled) => ErrorKind::Cancellation,
            RunError::Engine(EngineError::Cancelled) => ErrorKind::Cancellation,
            RunError::Engine(EngineError::Strategy { .. }) => ErrorKind::Strategy,
            RunError::Engine(EngineError::Validation(_) | EngineError::AlreadyStarted) => {
                ErrorKind::Validation
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }
}

/// Snapshot of an engine for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestStatus {
    pub state: RunState,
    pub is_running: bool,
    pub is_loading: bool,
    /// Progress of the current phase in percent: batches fetched while
    /// loading, candles simulated while running.
    pub progress: f64,
    /// Latest loader message, e.g. "batch 2/5 fetched".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub result: Option<BacktestResult>,
    pub error: Option<String>,
}

#[derive(Debug)]
struct Inner {
    state: RunState,
    progress: f64,
    message: Option<String>,
    result: Option<BacktestResult>,
    error: Option<String>,
}

impl Inner {
    fn idle() -> Self {
        Self {
            state: RunState::Idle,
            progress: 0.0,
            message: None,
            result: None,
            error: None,
        }
    }
}

pub struct BacktestEngine {
    inner: Mutex<Inner>,
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BacktestEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::idle()),
        }
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn status(&self) -> BacktestStatus {
        let inner = self.lock();
        BacktestStatus {
            state: inner.state,
            is_running: matches!(inner.state, RunState::Loading | RunState::Running),
            is_loading: inner.state == RunState::Loading,
            progress: inner.progress,
            message: inner.message.clone(),
            result: inner.result.clone(),
            error: inner.error.clone(),
        }
    }

    /// Return a finished engine to `Idle`. Rejected while a run is in flight.
    pub fn reset(&self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if matches!(inner.state, RunState::Loading | RunState::Running) {
            return Err(EngineError::AlreadyStarted);
        }
        *inner = Inner::idle();
        Ok(())
    }

    /// Load candles from `provider`, then simulate.
    pub fn run(
        &self,
        config: BacktestConfig,
        provider: &dyn MarketDataProvider,
        opts: &LoadOptions,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<BacktestResult, RunError> {
        self.claim(RunState::Loading)?;
        tracing::info!(
            symbol = %config.symbol,
            strategy = config.strategy.name(),
            granularity = config.granularity.as_str(),
            "backtest started"
        );

        if let Err(e) = config.validate() {
            return Err(self.finish_with_error(e.into()));
        }

        let loaded = {
            let mut sink = StatusSink {
                engine: self,
                forward: progress,
            };
            load_candles(provider, &config.history_request(), opts, cancel, &mut sink)
        };
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => return Err(self.finish_with_error(e.into())),
        };

        self.simulate(config, &loaded, cancel, progress)
    }

    /// Simulate over candles the caller already has.
    pub fn run_on_candles(
        &self,
        config: BacktestConfig,
        loaded: &LoadedCandles,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<BacktestResult, RunError> {
        self.claim(RunState::Running)?;
        if let Err(e) = config.validate() {
            return Err(self.finish_with_error(e.into()));
        }
        self.simulate(config, loaded, cancel, progress)
    }

    fn simulate(
        &self,
        mut config: BacktestConfig,
        loaded: &LoadedCandles,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<BacktestResult, RunError> {
        self.transition(RunState::Running);

        let engine_config = config.engine_config();
        let output = {
            let mut sink = StatusSink {
                engine: self,
                forward: progress,
            };
            run_simulation(
                &loaded.candles,
                config.strategy.as_mut(),
                &engine_config,
                cancel,
                &mut sink,
            )
        };
        let output = match output {
            Ok(output) => output,
            Err(e) => return Err(self.finish_with_error(e.into())),
        };

        let header = RunHeader {
            strategy: config.strategy.name().to_string(),
            symbol: config.symbol,
            start_date: config.start.timestamp_millis(),
            end_date: config.end.timestamp_millis(),
            granularity: config.granularity,
        };
        let result = BacktestResult::assemble(header, loaded, output);

        tracing::info!(
            symbol = %result.symbol,
            candles = result.candle_count,
            trades = result.metrics.total_trades,
            total_return = result.metrics.total_return,
            max_drawdown = result.metrics.max_drawdown,
            "backtest completed"
        );

        let mut inner = self.lock();
        inner.state = RunState::Completed;
        inner.progress = 100.0;
        inner.result = Some(result.clone());
        Ok(result)
    }

    fn claim(&self, next: RunState) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.state != RunState::Idle {
            return Err(EngineError::AlreadyStarted);
        }
        inner.state = next;
        Ok(())
    }

    fn transition(&self, next: RunState) {
        let mut inner = self.lock();
        debug_assert!(
            inner.state == next || inner.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            inner.state,
            next
        );
        inner.state = next;
    }

    /// Move to `Cancelled` or `Failed` and record the message.
    fn finish_with_error(&self, error: RunError) -> RunError {
        let terminal = if error.is_cancelled() {
            tracing::info!("backtest cancelled");
            RunState::Cancelled
        } else {
            tracing::warn!(kind = ?error.kind(), error = %error, "backtest failed");
            RunState::Failed
        };

        let mut inner = self.lock();
        inner.state = terminal;
        inner.result = None;
        inner.error = Some(error.to_string());
        error
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mirrors progress into the engine status, then forwards it.
struct StatusSink<'a> {
    engine: &'a BacktestEngine,
    forward: &'a mut dyn ProgressSink,
}

impl ProgressSink for StatusSink<'_> {
    fn report(&mut self, event: ProgressEvent) {
        {
            let mut inner = self.engine.lock();
            inner.progress = event.percent();
            if let ProgressEvent::BatchFetched { message, .. } = &event {
                inner.message = Some(message.clone());
            }
        }
        self.forward.report(event);
    }
}
