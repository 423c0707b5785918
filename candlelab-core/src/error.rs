//! Engine error type.

use thiserror::Error;

use crate::strategy::StrategyError;

/// Message reported when a run is stopped through its cancellation token.
pub const CANCELLED_MESSAGE: &str = "Backtest cancelled by user";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,

    /// Raised by the strategy; displays the strategy's own message.
    #[error("{error}")]
    Strategy {
        strategy: String,
        candle_index: usize,
        error: StrategyError,
    },

    #[error("engine already started; create a new engine or reset it")]
    AlreadyStarted,
}
