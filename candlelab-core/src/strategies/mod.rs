//! Reference strategies.

pub mod buy_and_hold;
pub mod ma_crossover;
pub mod scheduled;

pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::MaCrossover;
pub use scheduled::ScheduledSignals;
