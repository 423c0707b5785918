//! Shared fixtures: an in-memory provider and candle helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use candlelab_core::{CancellationToken, Candle, Granularity, TimestampMs};
use candlelab_runner::{DataError, HistoryRequest, MarketDataProvider};

pub const HOUR: i64 = 3_600_000;
pub const T0: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

/// Deterministic close for a timestamp.
pub fn price_at(ts: TimestampMs) -> f64 {
    let step = (ts / 60_000) as f64;
    100.0 + (step * 0.37).sin() * 10.0
}

/// Serves one candle per interval of the requested window.
pub struct MockProvider {
    pub requests: Mutex<Vec<HistoryRequest>>,
    pub calls: AtomicUsize,
    /// Fail the n-th call (1-based) with this error.
    pub fail_on: Option<(usize, DataError)>,
    /// Cancel this token during the n-th call.
    pub cancel_on: Option<(usize, CancellationToken)>,
    pub available: bool,
    /// Override the generated prices, keyed by offset from `T0` in intervals.
    pub closes: Option<Vec<f64>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on: None,
            cancel_on: None,
            available: true,
            closes: None,
        }
    }

    pub fn with_closes(closes: &[f64]) -> Self {
        Self {
            closes: Some(closes.to_vec()),
            ..Self::new()
        }
    }

    pub fn failing_on(call: usize, error: DataError) -> Self {
        Self {
            fail_on: Some((call, error)),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<(TimestampMs, TimestampMs)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.start_time, r.end_time))
            .collect()
    }

    fn close_for(&self, ts: TimestampMs, step: i64) -> Option<f64> {
        match &self.closes {
            Some(closes) => {
                let idx = (ts - T0) / step;
                if idx < 0 {
                    return None;
                }
                closes.get(idx as usize).copied()
            }
            None => Some(price_at(ts)),
        }
    }
}

impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_history(
        &self,
        request: &HistoryRequest,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Candle>, DataError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        if let Some((n, token)) = &self.cancel_on {
            if *n == call {
                token.cancel();
            }
        }
        if let Some((n, err)) = &self.fail_on {
            if *n == call {
                return Err(err.clone());
            }
        }

        let step = request.granularity.duration_ms();
        let mut out = Vec::new();
        let mut ts = request.start_time;
        while ts <= request.end_time {
            if let Some(c) = self.close_for(ts, step) {
                out.push(Candle::new(ts, c, c + 0.5, c - 0.5, c, 10.0));
            }
            ts += step;
        }
        Ok(out)
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

pub fn request(start: TimestampMs, end: TimestampMs, granularity: Granularity) -> HistoryRequest {
    HistoryRequest {
        symbol: "BTC-USD".into(),
        granularity,
        start_time: start,
        end_time: end,
        evaluators: vec![],
    }
}
