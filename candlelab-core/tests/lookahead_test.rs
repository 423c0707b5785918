//! Look-ahead contamination tests.
//!
//! Invariant: the decision at candle i sees exactly candles[0..=i].
//!
//! Method: a recording strategy asserts the observed prefix on every call,
//! and a replay on a truncated series must reproduce the same decisions.

use candlelab_core::{
    run_simulation, Account, CancellationToken, Candle, EngineConfig, NoProgress, Position,
    Signal, Strategy, StrategyError,
};
use candlelab_core::strategies::MaCrossover;

fn make_test_candles(n: usize) -> Vec<Candle> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            // Deterministic pseudo-random walk using a simple LCG
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let change = ((seed % 200) as f64 - 100.0) * 0.05;
            price = f64::max(price + change, 10.0);
            Candle::new(i as i64 * 60_000, price, price + 1.0, price - 1.0, price, 1.0)
        })
        .collect()
}

struct PrefixRecorder {
    expected: Vec<Candle>,
    calls: usize,
}

impl Strategy for PrefixRecorder {
    fn name(&self) -> &str {
        "prefix_recorder"
    }

    fn decide(
        &mut self,
        candles: &[Candle],
        _position: Option<&Position>,
        _account: &Account,
    ) -> Result<Signal, StrategyError> {
        if candles.len() != self.calls + 1 {
            return Err(StrategyError::new(format!(
                "call {} observed {} candles",
                self.calls,
                candles.len()
            )));
        }
        if candles != &self.expected[..=self.calls] {
            return Err(StrategyError::new("observed prefix differs from input"));
        }
        self.calls += 1;
        Ok(Signal::Hold)
    }
}

#[test]
fn strategy_sees_only_the_prefix() {
    let candles = make_test_candles(50);
    let mut recorder = PrefixRecorder {
        expected: candles.clone(),
        calls: 0,
    };

    run_simulation(
        &candles,
        &mut recorder,
        &EngineConfig::new(1_000.0),
        &CancellationToken::new(),
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(recorder.calls, 50);
}

#[test]
fn truncated_replay_matches_full_replay() {
    let full = make_test_candles(200);
    let truncated_len = 120;

    let run = |candles: &[Candle]| {
        let mut strategy = MaCrossover::new(5, 20, 1.0).unwrap();
        run_simulation(
            candles,
            &mut strategy,
            &EngineConfig::new(10_000.0),
            &CancellationToken::new(),
            &mut NoProgress,
        )
        .unwrap()
    };

    let full_out = run(&full);
    let truncated_out = run(&full[..truncated_len]);

    assert_eq!(
        &full_out.equity_curve[..truncated_len],
        &truncated_out.equity_curve[..],
        "equity before the cut must not depend on later candles"
    );
    assert_eq!(
        &full_out.drawdown_curve[..truncated_len],
        &truncated_out.drawdown_curve[..]
    );

    // Trades closed by signal before the cut are identical.
    let cut = full[truncated_len - 1].timestamp;
    let closed_before = |trades: &[candlelab_core::CompletedTrade]| {
        trades
            .iter()
            .filter(|t| t.exit_time < cut)
            .cloned()
            .collect::<Vec<_>>()
    };
    assert_eq!(closed_before(&full_out.trades), closed_before(&truncated_out.trades));
}
