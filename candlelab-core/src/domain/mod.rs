//! Domain types for candle replay.

pub mod account;
pub mod candle;
pub mod granularity;
pub mod position;
pub mod time;
pub mod trade;

pub use account::{Account, DrawdownCurvePoint, EquityCurvePoint};
pub use candle::Candle;
pub use granularity::Granularity;
pub use position::{Position, PositionSide};
pub use time::TimestampMs;
pub use trade::{CompletedTrade, ExitReason};
