//! Historical candle loading.
//!
//! Given a symbol, a time window and a granularity:
//! 1. Align the window (start down, end up) to interval boundaries
//! 2. Split it into batches of at most the provider's per-request cap
//! 3. Fetch the batches one at a time, checking cancellation in between
//! 4. Canonicalize the concatenation (window filter, strictly increasing)
//!
//! Any batch failure fails the whole load: no partial candle set escapes.
//!
//! Synthetic data is a developer-only fallback behind an explicit flag.
//! Results produced on synthetic data are tagged as such.

use candlelab_core::{
    CancellationToken, Candle, Granularity, ProgressEvent, ProgressSink, TimestampMs,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{DataError, HistoryRequest, MarketDataProvider};

/// Per-request candle cap of the market-data provider.
pub const DEFAULT_BATCH_CAP: usize = 200;

/// Base price of the synthetic random walk.
const SYNTHETIC_BASE_PRICE: f64 = 100.0;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid load request: {0}")]
    Validation(String),

    #[error("batch {batch}/{total} failed: {source}")]
    Batch {
        batch: usize,
        total: usize,
        #[source]
        source: DataError,
    },

    #[error("{}", candlelab_core::CANCELLED_MESSAGE)]
    Cancelled,
}

/// Options controlling how candles are loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Maximum candles per provider request.
    pub batch_cap: usize,
    /// Generate synthetic candles when the provider is unreachable.
    pub allow_synthetic: bool,
    /// Seed for the synthetic walk; `None` draws from entropy.
    pub synthetic_seed: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_cap: DEFAULT_BATCH_CAP,
            allow_synthetic: false,
            synthetic_seed: None,
        }
    }
}

/// Where the candles came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Provider,
    Synthetic,
}

/// One provider request window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub start: TimestampMs,
    pub end: TimestampMs,
    pub candles: usize,
}

/// Loaded candles with provenance.
#[derive(Debug, Clone)]
pub struct LoadedCandles {
    pub candles: Vec<Candle>,
    pub source: DataSource,
    /// BLAKE3 fingerprint of the candle sequence.
    pub dataset_hash: String,
}

/// Split the aligned window `[start, end]` into batches of at most `cap` candles.
///
/// Batches tile exactly: batch `i + 1` starts one interval after batch `i`
/// ends, and the last batch ends on the aligned `end`.
pub fn plan_batches(
    start: TimestampMs,
    end: TimestampMs,
    granularity: Granularity,
    cap: usize,
) -> Vec<BatchWindow> {
    let step = granularity.duration_ms();
    let start = granularity.align_down(start);
    let end = granularity.align_up(end);
    let cap = cap.max(1);

    let mut total = granularity.candles_between(start, end);
    let mut batches = Vec::with_capacity(total.div_ceil(cap));
    let mut cursor = start;
    while total > 0 {
        let n = total.min(cap);
        let batch_end = cursor + (n as i64 - 1) * step;
        batches.push(BatchWindow {
            start: cursor,
            end: batch_end,
            candles: n,
        });
        cursor = batch_end + step;
        total -= n;
    }
    batches
}

/// Load the candles for `request`, batching as needed.
///
/// The window in `request` is aligned before planning. Progress is reported
/// once per fetched batch and cancellation is checked before each one.
pub fn load_candles(
    provider: &dyn MarketDataProvider,
    request: &HistoryRequest,
    opts: &LoadOptions,
    cancel: &CancellationToken,
    progress: &mut dyn ProgressSink,
) -> Result<LoadedCandles, LoadError> {
    validate_request(request, opts)?;

    let granularity = request.granularity;
    let start = granularity.align_down(request.start_time);
    let end = granularity.align_up(request.end_time);

    if opts.allow_synthetic && !provider.is_available() {
        tracing::warn!(
            provider = provider.name(),
            symbol = %request.symbol,
            "provider unavailable, generating synthetic candles"
        );
        return Ok(synthetic(start, end, granularity, opts.synthetic_seed));
    }

    let batches = plan_batches(start, end, granularity, opts.batch_cap);
    let total = batches.len();
    tracing::info!(
        provider = provider.name(),
        symbol = %request.symbol,
        granularity = granularity.as_str(),
        batches = total,
        candles = batches.iter().map(|b| b.candles).sum::<usize>(),
        "loading candles"
    );

    let mut candles = Vec::new();
    for (i, window) in batches.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(batch = i + 1, total, "load cancelled");
            return Err(LoadError::Cancelled);
        }

        let batch_request = request.with_window(window.start, window.end);
        match provider.fetch_history(&batch_request, cancel) {
            Ok(mut fetched) => {
                tracing::info!(batch = i + 1, total, candles = fetched.len(), "batch fetched");
                candles.append(&mut fetched);
                progress.report(ProgressEvent::batch_fetched(i + 1, total));
            }
            Err(error) if cancel.is_cancelled() => {
                tracing::info!(batch = i + 1, total, %error, "load cancelled");
                return Err(LoadError::Cancelled);
            }
            Err(DataError::NetworkUnreachable(reason)) if opts.allow_synthetic => {
                tracing::warn!(
                    batch = i + 1,
                    total,
                    %reason,
                    "provider unreachable, generating synthetic candles"
                );
                return Ok(synthetic(start, end, granularity, opts.synthetic_seed));
            }
            Err(source) => {
                tracing::warn!(
                    batch = i + 1,
                    total,
                    error = %source,
                    "batch failed, aborting load"
                );
                return Err(LoadError::Batch {
                    batch: i + 1,
                    total,
                    source,
                });
            }
        }
    }

    let candles = canonicalize(candles, start, end);
    let dataset_hash = dataset_hash(&candles);
    Ok(LoadedCandles {
        candles,
        source: DataSource::Provider,
        dataset_hash,
    })
}

fn validate_request(request: &HistoryRequest, opts: &LoadOptions) -> Result<(), LoadError> {
    if request.symbol.trim().is_empty() {
        return Err(LoadError::Validation("symbol must not be empty".into()));
    }
    if request.start_time >= request.end_time {
        return Err(LoadError::Validation(format!(
            "start time {} must be before end time {}",
            request.start_time, request.end_time
        )));
    }
    if opts.batch_cap == 0 {
        return Err(LoadError::Validation("batch cap must be at least 1".into()));
    }
    Ok(())
}

/// Sort, keep the `[start, end]` window, and drop duplicate timestamps (first wins).
pub fn canonicalize(candles: Vec<Candle>, start: TimestampMs, end: TimestampMs) -> Vec<Candle> {
    let received = candles.len();
    let mut kept: Vec<Candle> = candles
        .into_iter()
        .filter(|c| c.timestamp >= start && c.timestamp <= end)
        .collect();
    let outside = received - kept.len();

    // Stable: among equal timestamps, the earliest fetched stays first.
    kept.sort_by_key(|c| c.timestamp);
    let before_dedup = kept.len();
    kept.dedup_by_key(|c| c.timestamp);
    let duplicates = before_dedup - kept.len();

    if outside > 0 || duplicates > 0 {
        tracing::warn!(
            outside_window = outside,
            duplicates,
            kept = kept.len(),
            "provider candles required canonicalization"
        );
    }
    kept
}

/// Deterministic BLAKE3 hash over timestamps and OHLCV values.
pub fn dataset_hash(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.timestamp.to_le_bytes());
        hasher.update(&c.open.to_le_bytes());
        hasher.update(&c.high.to_le_bytes());
        hasher.update(&c.low.to_le_bytes());
        hasher.update(&c.close.to_le_bytes());
        hasher.update(&c.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn synthetic(
    start: TimestampMs,
    end: TimestampMs,
    granularity: Granularity,
    seed: Option<u64>,
) -> LoadedCandles {
    let candles = generate_synthetic_candles(start, end, granularity, seed);
    let dataset_hash = dataset_hash(&candles);
    LoadedCandles {
        candles,
        source: DataSource::Synthetic,
        dataset_hash,
    }
}

/// Generate a bounded random walk, one candle per interval over `[start, end]`.
///
/// Prices stay within half and one-and-a-half times the base price.
pub fn generate_synthetic_candles(
    start: TimestampMs,
    end: TimestampMs,
    granularity: Granularity,
    seed: Option<u64>,
) -> Vec<Candle> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let step = granularity.duration_ms();
    let start = granularity.align_down(start);
    let end = granularity.align_up(end);
    let floor = SYNTHETIC_BASE_PRICE * 0.5;
    let ceiling = SYNTHETIC_BASE_PRICE * 1.5;

    let mut candles = Vec::with_capacity(granularity.candles_between(start, end));
    let mut price = SYNTHETIC_BASE_PRICE;
    let mut ts = start;
    while ts <= end {
        let change: f64 = rng.gen_range(-0.01..0.01);
        let open = price;
        let close = (price * (1.0 + change)).clamp(floor, ceiling);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
        let volume = rng.gen_range(100.0..10_000.0);

        candles.push(Candle::new(ts, open, high, low, close, volume));
        price = close;
        ts += step;
    }
    candles
}
