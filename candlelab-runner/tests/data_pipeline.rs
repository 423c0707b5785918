//! Integration tests for batched candle loading against an in-memory provider.

mod common;

use candlelab_core::{CancellationToken, Granularity, NoProgress, ProgressEvent};
use candlelab_runner::{
    load_candles, plan_batches, DataError, DataSource, LoadError, LoadOptions,
};
use common::{request, MockProvider, HOUR, T0};
use proptest::prelude::*;

fn opts(cap: usize) -> LoadOptions {
    LoadOptions {
        batch_cap: cap,
        ..LoadOptions::default()
    }
}

#[test]
fn small_range_is_a_single_request() {
    let provider = MockProvider::new();
    let loaded = load_candles(
        &provider,
        &request(T0, T0 + 23 * HOUR, Granularity::OneHour),
        &opts(200),
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(loaded.candles.len(), 24);
    assert_eq!(loaded.source, DataSource::Provider);
}

#[test]
fn unaligned_window_is_widened_to_boundaries() {
    let provider = MockProvider::new();
    let loaded = load_candles(
        &provider,
        &request(T0 + 10 * 60_000, T0 + 2 * HOUR + 1, Granularity::OneHour),
        &opts(200),
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(provider.windows(), vec![(T0, T0 + 3 * HOUR)]);
    assert_eq!(loaded.candles.first().map(|c| c.timestamp), Some(T0));
    assert_eq!(loaded.candles.last().map(|c| c.timestamp), Some(T0 + 3 * HOUR));
}

#[test]
fn large_range_is_fetched_sequentially_in_tiled_batches() {
    let provider = MockProvider::new();
    let mut events = Vec::new();
    let mut sink = |e: ProgressEvent| events.push(e);

    let loaded = load_candles(
        &provider,
        &request(T0, T0 + 499 * HOUR, Granularity::OneHour),
        &opts(200),
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(
        provider.windows(),
        vec![
            (T0, T0 + 199 * HOUR),
            (T0 + 200 * HOUR, T0 + 399 * HOUR),
            (T0 + 400 * HOUR, T0 + 499 * HOUR),
        ]
    );
    assert_eq!(loaded.candles.len(), 500);
    for pair in loaded.candles.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, HOUR);
    }

    let messages: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::BatchFetched { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        messages,
        vec!["batch 1/3 fetched", "batch 2/3 fetched", "batch 3/3 fetched"]
    );
}

#[test]
fn batching_matches_a_single_unbounded_request() {
    let req = request(T0, T0 + 999 * 15 * 60_000, Granularity::FifteenMinute);
    let run = |cap| {
        load_candles(
            &MockProvider::new(),
            &req,
            &opts(cap),
            &CancellationToken::new(),
            &mut NoProgress,
        )
        .unwrap()
    };

    let single = run(10_000);
    let batched = run(7);
    assert_eq!(single.candles, batched.candles);
    assert_eq!(single.dataset_hash, batched.dataset_hash);
}

#[test]
fn any_batch_failure_fails_the_whole_load() {
    let provider = MockProvider::failing_on(2, DataError::Http { status: 502 });
    let err = load_candles(
        &provider,
        &request(T0, T0 + 499 * HOUR, Granularity::OneHour),
        &opts(200),
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap_err();

    match err {
        LoadError::Batch { batch, total, source } => {
            assert_eq!((batch, total), (2, 3));
            assert_eq!(source, DataError::Http { status: 502 });
        }
        other => panic!("expected batch error, got {other:?}"),
    }
    // Nothing after the failed batch is requested.
    assert_eq!(provider.call_count(), 2);
}

#[test]
fn cancellation_is_observed_between_batches() {
    let token = CancellationToken::new();
    let provider = MockProvider {
        cancel_on: Some((1, token.clone())),
        ..MockProvider::new()
    };

    let err = load_candles(
        &provider,
        &request(T0, T0 + 499 * HOUR, Granularity::OneHour),
        &opts(200),
        &token,
        &mut NoProgress,
    )
    .unwrap_err();

    assert!(matches!(err, LoadError::Cancelled));
    assert_eq!(err.to_string(), "Backtest cancelled by user");
    assert_eq!(provider.call_count(), 1);
}

#[test]
fn batch_abandoned_after_cancel_reports_cancellation() {
    let token = CancellationToken::new();
    let provider = MockProvider {
        cancel_on: Some((1, token.clone())),
        fail_on: Some((1, DataError::Http { status: 503 })),
        ..MockProvider::new()
    };

    let err = load_candles(
        &provider,
        &request(T0, T0 + 99 * HOUR, Granularity::OneHour),
        &LoadOptions {
            allow_synthetic: true,
            ..opts(200)
        },
        &token,
        &mut NoProgress,
    )
    .unwrap_err();

    assert!(matches!(err, LoadError::Cancelled));
    assert_eq!(provider.call_count(), 1);
}

#[test]
fn unreachable_provider_without_flag_is_an_error() {
    let provider =
        MockProvider::failing_on(1, DataError::NetworkUnreachable("connection refused".into()));
    let err = load_candles(
        &provider,
        &request(T0, T0 + 10 * HOUR, Granularity::OneHour),
        &opts(200),
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Batch { .. }));
}

#[test]
fn unreachable_provider_with_flag_falls_back_to_synthetic() {
    let provider =
        MockProvider::failing_on(1, DataError::NetworkUnreachable("connection refused".into()));
    let loaded = load_candles(
        &provider,
        &request(T0, T0 + 10 * HOUR, Granularity::OneHour),
        &LoadOptions {
            allow_synthetic: true,
            synthetic_seed: Some(42),
            ..LoadOptions::default()
        },
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(loaded.source, DataSource::Synthetic);
    assert_eq!(loaded.candles.len(), 11);
    assert_eq!(loaded.candles[0].timestamp, T0);
}

#[test]
fn unavailable_provider_with_flag_is_never_called() {
    let provider = MockProvider {
        available: false,
        ..MockProvider::new()
    };
    let loaded = load_candles(
        &provider,
        &request(T0, T0 + 10 * HOUR, Granularity::OneHour),
        &LoadOptions {
            allow_synthetic: true,
            ..LoadOptions::default()
        },
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap();
    assert_eq!(loaded.source, DataSource::Synthetic);
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn inverted_window_is_rejected_before_any_request() {
    let provider = MockProvider::new();
    let err = load_candles(
        &provider,
        &request(T0 + HOUR, T0, Granularity::OneHour),
        &opts(200),
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Validation(_)));
    assert_eq!(provider.call_count(), 0);
}

proptest! {
    #[test]
    fn batches_tile_the_aligned_window(
        start in 0i64..10_000_000_000,
        span in 1i64..2_000_000_000,
        cap in 1usize..300,
        g in 0usize..Granularity::ALL.len(),
    ) {
        let granularity = Granularity::ALL[g];
        let step = granularity.duration_ms();
        let end = start + span;
        let batches = plan_batches(start, end, granularity, cap);

        prop_assert!(!batches.is_empty());
        prop_assert_eq!(batches[0].start, granularity.align_down(start));
        prop_assert_eq!(batches.last().unwrap().end, granularity.align_up(end));
        for b in &batches {
            prop_assert!(b.candles >= 1 && b.candles <= cap);
            prop_assert_eq!(b.end - b.start, (b.candles as i64 - 1) * step);
        }
        for pair in batches.windows(2) {
            prop_assert_eq!(pair[1].start, pair[0].end + step);
        }
        let total: usize = batches.iter().map(|b| b.candles).sum();
        prop_assert_eq!(
            total,
            granularity.candles_between(granularity.align_down(start), granularity.align_up(end))
        );
    }
}
