//! Symbol in, rolled-up series out.

use crate::aggregate::Aggregator;
use crate::data::{DataError, SliceOrchestrator};
use crate::domain::TickerSeries;
use std::time::Instant;
use tracing::info;

/// Fetch all 24 slices of `symbol` and aggregate them.
///
/// Returns the complete tree or the first terminal error; never a partial tree.
pub fn fetch_ticker_series(
    orchestrator: &SliceOrchestrator,
    symbol: &str,
) -> Result<TickerSeries, DataError> {
    let started = Instant::now();
    let slices = orchestrator.fetch_all_slices(symbol)?;
    let bytes = slices.total_bytes();
    let fetched_in = started.elapsed();

    let series = Aggregator::build(symbol.trim(), slices)?;
    let fingerprint = series.fingerprint();

    info!(
        symbol = %series.symbol,
        bytes,
        days = series.day_count(),
        minutes = series.minute_count(),
        fetch_ms = fetched_in.as_millis() as u64,
        total_ms = started.elapsed().as_millis() as u64,
        fingerprint = %&fingerprint[..16],
        "series built"
    );
    Ok(series)
}
