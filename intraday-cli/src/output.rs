//! Writing finished series to disk and reading them back for summaries.

use anyhow::{Context, Result};
use intraday_core::domain::{Rollup, TickerSeries};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Output path for a symbol: `{dir}/{SYMBOL}.json`.
pub fn series_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}.json"))
}

/// Serialize `series` into `dir`, creating the directory if needed.
///
/// The file is written to a `.tmp` sibling first and renamed into place, so a
/// reader never sees a half-written series.
pub fn write_series(dir: &Path, series: &TickerSeries, pretty: bool) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let path = series_path(dir, &series.symbol);
    let tmp_path = path.with_extension("json.tmp");

    let json = if pretty {
        serde_json::to_vec_pretty(series)
    } else {
        serde_json::to_vec(series)
    }
    .context("failed to serialize series")?;

    fs::write(&tmp_path, json).with_context(|| format!("failed to write {}", tmp_path.display()))?;
    if let Err(e) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("atomic rename to {} failed", path.display()));
    }
    Ok(path)
}

pub fn read_series(path: &Path) -> Result<TickerSeries> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not a series file", path.display()))
}

fn rollup_line(label: &str, r: &Rollup) -> String {
    if r.is_degenerate() {
        return format!("{label:<10} (no session data)");
    }
    format!(
        "{label:<10} O {:>10.2}  H {:>10.2}  L {:>10.2}  C {:>10.2}  V {:>14}  ({} min)",
        r.open, r.high, r.low, r.close, r.volume, r.minutes
    )
}

/// Human-readable yearly and monthly rollups.
pub fn render_summary(series: &TickerSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} days, {} minutes, fingerprint {}",
        series.symbol,
        series.day_count(),
        series.minute_count(),
        &series.fingerprint()[..16]
    );
    for (year, y) in &series.years {
        let _ = writeln!(out, "{}", rollup_line(&year.to_string(), &y.rollup));
        for (month, m) in &y.months {
            let label = format!("  {year}-{month:02}");
            let _ = writeln!(out, "{}", rollup_line(&label, &m.rollup));
        }
    }
    out
}
