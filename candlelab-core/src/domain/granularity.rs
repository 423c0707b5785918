//! Candle interval units and their fixed millisecond durations.

use serde::{Deserialize, Serialize};

use super::time::TimestampMs;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const YEAR_MS: i64 = 365 * DAY_MS;

/// Fixed interval between consecutive candles.
///
/// Parsing is lenient: provider names are accepted in singular or plural
/// form (`FIVE_MINUTE` / `FIVE_MINUTES`), case-insensitively, and anything
/// unrecognized falls back to [`Granularity::OneHour`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Granularity {
    OneMinute,
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    #[default]
    OneHour,
    TwoHour,
    FourHour,
    SixHour,
    OneDay,
}

impl Granularity {
    pub const ALL: [Granularity; 9] = [
        Granularity::OneMinute,
        Granularity::FiveMinute,
        Granularity::FifteenMinute,
        Granularity::ThirtyMinute,
        Granularity::OneHour,
        Granularity::TwoHour,
        Granularity::FourHour,
        Granularity::SixHour,
        Granularity::OneDay,
    ];

    pub fn duration_ms(self) -> i64 {
        match self {
            Granularity::OneMinute => MINUTE_MS,
            Granularity::FiveMinute => 5 * MINUTE_MS,
            Granularity::FifteenMinute => 15 * MINUTE_MS,
            Granularity::ThirtyMinute => 30 * MINUTE_MS,
            Granularity::OneHour => HOUR_MS,
            Granularity::TwoHour => 2 * HOUR_MS,
            Granularity::FourHour => 4 * HOUR_MS,
            Granularity::SixHour => 6 * HOUR_MS,
            Granularity::OneDay => DAY_MS,
        }
    }

    /// Wire name sent to the market data provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::OneMinute => "ONE_MINUTE",
            Granularity::FiveMinute => "FIVE_MINUTE",
            Granularity::FifteenMinute => "FIFTEEN_MINUTE",
            Granularity::ThirtyMinute => "THIRTY_MINUTE",
            Granularity::OneHour => "ONE_HOUR",
            Granularity::TwoHour => "TWO_HOUR",
            Granularity::FourHour => "FOUR_HOUR",
            Granularity::SixHour => "SIX_HOUR",
            Granularity::OneDay => "ONE_DAY",
        }
    }

    /// Strict lookup; `None` for names outside the table.
    pub fn try_parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let singular = normalized.strip_suffix('S').unwrap_or(&normalized);
        Self::ALL.into_iter().find(|g| g.as_str() == singular)
    }

    /// Lenient lookup; unknown names map to one hour.
    pub fn parse(name: &str) -> Self {
        Self::try_parse(name).unwrap_or_else(|| {
            tracing::debug!(granularity = name, "unrecognized granularity, using ONE_HOUR");
            Granularity::OneHour
        })
    }

    /// Number of intervals in a 365-day year (markets assumed open 24/7).
    pub fn periods_per_year(self) -> f64 {
        YEAR_MS as f64 / self.duration_ms() as f64
    }

    /// Round a timestamp down to the enclosing interval boundary.
    pub fn align_down(self, ts: TimestampMs) -> TimestampMs {
        let d = self.duration_ms();
        ts.div_euclid(d) * d
    }

    /// Round a timestamp up to the next interval boundary (identity on a boundary).
    pub fn align_up(self, ts: TimestampMs) -> TimestampMs {
        let down = self.align_down(ts);
        if down == ts {
            ts
        } else {
            down + self.duration_ms()
        }
    }

    /// Number of candles in the inclusive, boundary-aligned range `[start, end]`.
    pub fn candles_between(self, start: TimestampMs, end: TimestampMs) -> usize {
        if end < start {
            return 0;
        }
        ((end - start) / self.duration_ms()) as usize + 1
    }
}

impl From<String> for Granularity {
    fn from(name: String) -> Self {
        Granularity::parse(&name)
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        g.as_str().to_string()
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
