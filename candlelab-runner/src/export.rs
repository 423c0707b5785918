//! Result export: JSON, CSV, and artifact bundles.
//!
//! - **JSON**: full `BacktestResult` with schema versioning and ISO-8601 timestamps
//! - **CSV**: trade tape and equity/drawdown curve for spreadsheets
//!
//! Persisted results carry `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use candlelab_core::domain::time::to_iso;

use crate::result::{BacktestResult, SCHEMA_VERSION};

/// Header of the trade CSV.
pub const TRADES_CSV_HEADER: [&str; 10] = [
    "Entry Time",
    "Exit Time",
    "Symbol",
    "Side",
    "Quantity",
    "Entry Price",
    "Exit Price",
    "P&L ($)",
    "P&L (%)",
    "Duration (ms)",
];

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One row per trade, timestamps in ISO-8601.
pub fn export_trades_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADES_CSV_HEADER)?;

    for t in &result.trades {
        wtr.write_record([
            to_iso(t.entry_time),
            to_iso(t.exit_time),
            result.symbol.clone(),
            t.side.as_str().to_string(),
            t.quantity.to_string(),
            t.entry_price.to_string(),
            t.exit_price.to_string(),
            format!("{:.2}", t.pnl),
            format!("{:.2}", t.pnl_percent),
            t.duration_ms.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity and drawdown per processed candle.
pub fn export_equity_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "drawdown_percent"])?;
    for (eq, dd) in result.equity_curve.iter().zip(&result.drawdown_curve) {
        wtr.write_record([
            to_iso(eq.timestamp),
            format!("{:.2}", eq.equity),
            format!("{:.4}", dd.drawdown_percent),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `result.json`, `trades.csv` and `equity.csv` into `dir`.
///
/// The directory is created if missing. Returns `dir`.
pub fn save_artifacts(result: &BacktestResult, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let files = [
        ("result.json", export_json(result)?),
        ("trades.csv", export_trades_csv(result)?),
        ("equity.csv", export_equity_csv(result)?),
    ];
    for (name, contents) in files {
        let path = dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    tracing::info!(dir = %dir.display(), "artifacts saved");
    Ok(dir.to_path_buf())
}

/// Directory name for a run: `{symbol}_{strategy}_{YYYYmmdd_HHMMSS}`.
pub fn artifact_dir_name(result: &BacktestResult) -> String {
    format!(
        "{}_{}_{}",
        path_safe(&result.symbol),
        path_safe(&result.strategy),
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    )
}

fn path_safe(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
