//! CandleLab CLI: run backtests, inspect batch plans, re-export results.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML run file and save artifacts
//! - `plan`: print the provider batches a time range would need
//! - `export`: write CSV files from a saved `result.json`

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candlelab_core::domain::time::to_iso;
use candlelab_core::{CancellationToken, Granularity, ProgressEvent};
use candlelab_runner::export::artifact_dir_name;
use candlelab_runner::{
    export_equity_csv, export_trades_csv, import_json, plan_batches, save_artifacts,
    BacktestEngine, BacktestResult, HttpProvider, RunFile, DEFAULT_BATCH_CAP,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "candlelab", about = "CandleLab CLI: candle replay backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML run file.
    Run {
        /// Path to the run file.
        #[arg(long)]
        config: PathBuf,

        /// Fall back to synthetic candles if the provider is unreachable.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Directory receiving the run's artifact folder.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Print the batch plan for a time range.
    Plan {
        /// Range start (RFC 3339).
        #[arg(long)]
        start: DateTime<Utc>,

        /// Range end (RFC 3339).
        #[arg(long)]
        end: DateTime<Utc>,

        /// Granularity name, e.g. ONE_HOUR or FIVE_MINUTES.
        #[arg(long, default_value = "ONE_HOUR")]
        granularity: String,

        /// Candles per provider request.
        #[arg(long, default_value_t = DEFAULT_BATCH_CAP)]
        cap: usize,
    },
    /// Write trades.csv and equity.csv from a saved result.json.
    Export {
        /// Path to result.json.
        result: PathBuf,

        /// Output directory. Defaults to the result file's directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            output_dir,
        } => run_backtest_cmd(&config, synthetic, &output_dir),
        Commands::Plan {
            start,
            end,
            granularity,
            cap,
        } => run_plan(start, end, &granularity, cap),
        Commands::Export { result, out } => run_export(&result, out.as_deref()),
    }
}

fn run_backtest_cmd(config_path: &Path, synthetic: bool, output_dir: &Path) -> Result<()> {
    let file = RunFile::load(config_path)?;
    let mut opts = file.provider.load_options();
    opts.allow_synthetic |= synthetic;
    let provider = HttpProvider::new(&file.provider.http_config())?;
    let config = file.into_backtest_config()?;

    let engine = BacktestEngine::new();
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone())?;
    let mut next_report = 0.0;
    let mut progress = |event: ProgressEvent| match event {
        ProgressEvent::BatchFetched { message, .. } => tracing::info!("{message}"),
        ProgressEvent::Simulating { percent } => {
            if percent >= next_report {
                tracing::info!("simulated {percent:.0}%");
                next_report = (percent / 25.0).floor() * 25.0 + 25.0;
            }
        }
    };

    let result = engine.run(config, &provider, &opts, &cancel, &mut progress)?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, &output_dir.join(artifact_dir_name(&result)))?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

/// Cancel the run on the first Ctrl-C so it ends as `Cancelled`.
fn cancel_on_interrupt(cancel: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || runtime.block_on(forward_interrupt(tokio::signal::ctrl_c(), cancel)))
        .context("failed to spawn interrupt watcher")?;
    Ok(())
}

async fn forward_interrupt<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::warn!("interrupt received, cancelling backtest");
            cancel.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
    }
}

fn run_plan(start: DateTime<Utc>, end: DateTime<Utc>, granularity: &str, cap: usize) -> Result<()> {
    let granularity = Granularity::parse(granularity);
    let batches = plan_batches(
        start.timestamp_millis(),
        end.timestamp_millis(),
        granularity,
        cap,
    );

    println!(
        "{} batch(es) at {} (cap {cap}):",
        batches.len(),
        granularity.as_str()
    );
    for (i, b) in batches.iter().enumerate() {
        println!(
            "  {:>4}  {} .. {}  {:>4} candles",
            i + 1,
            to_iso(b.start),
            to_iso(b.end),
            b.candles
        );
    }
    Ok(())
}

fn run_export(result_path: &Path, out: Option<&Path>) -> Result<()> {
    let json = std::fs::read_to_string(result_path)
        .with_context(|| format!("failed to read {}", result_path.display()))?;
    let result = import_json(&json)?;

    let dir = match out {
        Some(dir) => dir.to_path_buf(),
        None => result_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    std::fs::write(dir.join("trades.csv"), export_trades_csv(&result)?)?;
    std::fs::write(dir.join("equity.csv"), export_equity_csv(&result)?)?;
    println!("Exported {} trades to {}", result.trades.len(), dir.display());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Strategy:       {}", result.strategy);
    println!(
        "Period:         {} to {}",
        to_iso(result.start_date),
        to_iso(result.end_date)
    );
    println!(
        "Candles:        {} ({})",
        result.candle_count,
        result.granularity.as_str()
    );
    println!("Trades:         {}", m.total_trades);
    println!();
    println!("--- Performance ---");
    println!("Final Balance:  {:.2}", result.account.balance);
    println!("Total Return:   {:.2}%", m.total_return);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg Trade P&L:  {:.2}", m.average_trade_pnl);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    if let Some(pos) = &result.open_position {
        println!();
        println!(
            "Open position:  {} {} @ {:.2}",
            pos.side.as_str(),
            pos.quantity,
            pos.entry_price
        );
    }
    if result.is_synthetic() {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn interrupt_cancels_the_run() {
        let cancel = CancellationToken::new();
        block_on(forward_interrupt(async { Ok(()) }, cancel.clone()));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn listener_failure_leaves_the_run_alone() {
        let cancel = CancellationToken::new();
        block_on(forward_interrupt(
            async { Err(std::io::Error::other("no signal driver")) },
            cancel.clone(),
        ));
        assert!(!cancel.is_cancelled());
    }
}
