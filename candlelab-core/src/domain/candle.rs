//! Candle: the fundamental market data unit.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::time::{iso_millis, TimestampMs};

/// OHLCV summary for one fixed interval.
///
/// `evaluations` carries indicator outputs precomputed by the data provider,
/// keyed by evaluator name. The engine never interprets them; strategies may.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "iso_millis")]
    pub timestamp: TimestampMs,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluations: Option<Map<String, Value>>,
}

impl Candle {
    pub fn new(
        timestamp: TimestampMs,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            evaluations: None,
        }
    }

    /// Output of a named evaluator attached to this candle, if any.
    pub fn evaluation(&self, name: &str) -> Option<&Value> {
        self.evaluations.as_ref().and_then(|e| e.get(name))
    }

    /// Basic OHLC sanity: finite, positive, and high/low bracket open/close.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Candle {
        Candle::new(1_704_067_200_000, 100.0, 105.0, 98.0, 103.0, 50_000.0)
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample().is_sane());
    }

    #[test]
    fn candle_detects_inverted_range() {
        let mut c = sample();
        c.high = 97.0;
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_detects_nan() {
        let mut c = sample();
        c.close = f64::NAN;
        assert!(!c.is_sane());
    }

    #[test]
    fn evaluations_lookup() {
        let mut c = sample();
        let mut evals = Map::new();
        evals.insert("rsi_14".into(), Value::from(61.5));
        c.evaluations = Some(evals);
        assert_eq!(c.evaluation("rsi_14").and_then(Value::as_f64), Some(61.5));
        assert!(c.evaluation("macd").is_none());
    }

    #[test]
    fn serializes_iso_timestamp_and_omits_empty_evaluations() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00.000Z");
        assert!(json.get("evaluations").is_none());
    }
}
