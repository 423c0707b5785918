//! Market-data provider contract and the HTTP provider.
//!
//! The provider serves `GET {base}/history` and answers with
//! `{"candles": [{timestamp, open, high, low, close, volume?, evaluations?}]}`,
//! timestamps in integer milliseconds. Each request covers at most the
//! provider's per-request cap; batching lives in the data loader.

use std::time::{Duration, Instant};

use candlelab_core::{CancellationToken, Candle, Granularity, TimestampMs};
use serde::Deserialize;
use thiserror::Error;

/// Structured errors from a single provider request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider returned HTTP {status}")]
    Http { status: u16 },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("http client setup failed: {0}")]
    Client(String),
}

impl DataError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. } => true,
            DataError::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

/// One provider request: a symbol over an aligned, inclusive time window.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub symbol: String,
    pub granularity: Granularity,
    pub start_time: TimestampMs,
    pub end_time: TimestampMs,
    pub evaluators: Vec<String>,
}

impl HistoryRequest {
    /// Same request over a different window.
    pub fn with_window(&self, start_time: TimestampMs, end_time: TimestampMs) -> Self {
        Self {
            start_time,
            end_time,
            ..self.clone()
        }
    }
}

/// Source of historical candles.
///
/// Implementations must return candles in ascending timestamp order for the
/// requested window. Swappable so tests can run without a network.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Fetch one window. Implementations that wait between attempts should
    /// give up once `cancel` fires and return the last error.
    fn fetch_history(
        &self,
        request: &HistoryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candle>, DataError>;

    /// Whether the provider is currently reachable.
    fn is_available(&self) -> bool {
        true
    }
}

// ─── Wire format ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    candles: Option<Vec<WireCandle>>,
}

#[derive(Debug, Deserialize)]
struct WireCandle {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    evaluations: Option<serde_json::Map<String, serde_json::Value>>,
}

impl From<WireCandle> for Candle {
    fn from(w: WireCandle) -> Self {
        Candle {
            timestamp: w.timestamp,
            open: w.open,
            high: w.high,
            low: w.low,
            close: w.close,
            volume: w.volume.unwrap_or(0.0),
            evaluations: w.evaluations,
        }
    }
}

/// Parse a `/history` response body into candles.
///
/// A body without a `candles` key is a format error; an empty array is a
/// valid (empty) window.
pub fn parse_history_response(body: &str) -> Result<Vec<Candle>, DataError> {
    let resp: HistoryResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormat(format!("invalid history payload: {e}")))?;
    let candles = resp
        .candles
        .ok_or_else(|| DataError::ResponseFormat("missing `candles` array".into()))?;
    Ok(candles.into_iter().map(Candle::from).collect())
}

// ─── HTTP provider ──────────────────────────────────────────────────

/// Settings for [`HttpProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Upper bound on any single wait, including a server's `Retry-After`.
    pub max_retry_delay: Duration,
    /// Per-request timeout. `None` waits indefinitely; cancellation is the
    /// caller's abort mechanism.
    pub timeout: Option<Duration>,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(60),
            timeout: None,
        }
    }
}

/// Blocking HTTP provider with retry and exponential backoff.
pub struct HttpProvider {
    client: reqwest::blocking::Client,
    endpoint: reqwest::Url,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl HttpProvider {
    pub fn new(config: &HttpProviderConfig) -> Result<Self, DataError> {
        let endpoint = history_endpoint(&config.base_url)?;

        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("candlelab/", env!("CARGO_PKG_VERSION")));
        // The blocking client defaults to a 30s timeout; clear it unless set.
        builder = builder.timeout(config.timeout);
        let client = builder
            .build()
            .map_err(|e| DataError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            max_delay: config.max_retry_delay,
        })
    }

    /// Full request URL for one history window.
    pub fn history_url(&self, request: &HistoryRequest) -> reqwest::Url {
        history_url(&self.endpoint, request)
    }

    fn fetch_once(&self, url: &reqwest::Url, symbol: &str) -> Result<Vec<Candle>, DataError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(DataError::RateLimited { retry_after_secs });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        parse_history_response(&body)
    }

    fn fetch_with_retry(
        &self,
        request: &HistoryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candle>, DataError> {
        let url = self.history_url(request);
        let mut attempt = 0;

        loop {
            match self.fetch_once(&url, &request.symbol) {
                Ok(candles) => return Ok(candles),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.base_delay, self.max_delay, attempt, &e);
                    attempt += 1;
                    tracing::warn!(
                        symbol = %request.symbol,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "history request failed, retrying"
                    );
                    if !sleep_unless_cancelled(delay, cancel) {
                        tracing::info!(symbol = %request.symbol, "retry abandoned, cancelled");
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl MarketDataProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_history(
        &self,
        request: &HistoryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candle>, DataError> {
        self.fetch_with_retry(request, cancel)
    }
}

fn history_endpoint(base_url: &str) -> Result<reqwest::Url, DataError> {
    let raw = format!("{}/history", base_url.trim_end_matches('/'));
    reqwest::Url::parse(&raw)
        .map_err(|e| DataError::Client(format!("invalid base url '{base_url}': {e}")))
}

fn history_url(endpoint: &reqwest::Url, request: &HistoryRequest) -> reqwest::Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("symbol", &request.symbol)
        .append_pair("granularity", request.granularity.as_str())
        .append_pair("start_time", &request.start_time.to_string())
        .append_pair("end_time", &request.end_time.to_string())
        .append_pair("evaluators", &request.evaluators.join(","));
    url
}

/// Sleep for `delay` in short slices. Returns `false` if cancelled first.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}

/// `base * 2^attempt`, or the server's `Retry-After` when it asks for
/// longer, never more than `max`.
fn backoff_delay(base: Duration, max: Duration, attempt: u32, error: &DataError) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let delay = match error {
        DataError::RateLimited { retry_after_secs } => {
            exponential.max(Duration::from_secs(*retry_after_secs))
        }
        _ => exponential,
    };
    delay.min(max)
}
