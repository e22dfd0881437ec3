//! Backtest artifacts: result JSON, fill tape CSV and equity CSV.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::backtest::{BacktestResult, SCHEMA_VERSION};

pub fn write_result_json(path: &Path, result: &BacktestResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write result JSON {}", path.display()))?;
    Ok(())
}

/// Load a result written by [`write_result_json`].
pub fn load_result_json(path: &Path) -> Result<BacktestResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read result JSON {}", path.display()))?;
    let result: BacktestResult = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse result JSON {}", path.display()))?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Columns: order_id, timestamp, side, quantity, price, commission, slippage
pub fn write_fills_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create fills CSV {}", path.display()))?;
    wtr.write_record([
        "order_id",
        "timestamp",
        "side",
        "quantity",
        "price",
        "commission",
        "slippage",
    ])?;
    for f in &result.fills {
        wtr.write_record([
            &f.order_id.to_string(),
            &f.timestamp.to_string(),
            &f.side.to_string(),
            &format!("{:.8}", f.quantity),
            &format!("{:.4}", f.price),
            &format!("{:.4}", f.commission),
            &format!("{:.4}", f.slippage),
        ])?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush fills CSV {}", path.display()))?;
    Ok(())
}

/// Columns: timestamp, price, cash, asset_qty, equity
pub fn write_equity_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create equity CSV {}", path.display()))?;
    wtr.write_record(["timestamp", "price", "cash", "asset_qty", "equity"])?;
    for p in &result.equity_curve {
        wtr.write_record([
            &p.timestamp.to_string(),
            &format!("{:.4}", p.price),
            &format!("{:.2}", p.cash),
            &format!("{:.8}", p.asset_qty),
            &format!("{:.2}", p.equity),
        ])?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush equity CSV {}", path.display()))?;
    Ok(())
}

/// Write the full artifact set under `output_dir/{security}_{run_id prefix}/`.
///
/// Returns the run directory.
pub fn save_artifacts(output_dir: &Path, result: &BacktestResult) -> Result<PathBuf> {
    let short_id = result.run_id.get(..12).unwrap_or(&result.run_id);
    let dir = output_dir.join(format!("{}_{short_id}", result.security));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create run directory {}", dir.display()))?;

    write_result_json(&dir.join("result.json"), result)?;
    write_fills_csv(&dir.join("fills.csv"), result)?;
    write_equity_csv(&dir.join("equity.csv"), result)?;
    Ok(dir)
}
