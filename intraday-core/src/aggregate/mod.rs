//! Aggregation: raw slice payloads in, a rolled-up [`TickerSeries`] out.

pub mod parse;
pub mod rollup;

pub use parse::{parse_payload, MinuteRecord, FIELD_COUNT, TIMESTAMP_FORMAT};
pub use rollup::{roll_up_day, roll_up_month, roll_up_series, roll_up_year};

use crate::data::{DataError, RawSlice};
use crate::domain::TickerSeries;
use tracing::{debug, warn};

/// Builds one symbol's tree from any number of payloads.
///
/// Payloads are parsed one at a time; a payload that fails to parse leaves the
/// tree untouched. Rollups are computed once, in [`Aggregator::finish`].
#[derive(Debug)]
pub struct Aggregator {
    series: TickerSeries,
    rows: usize,
    replaced: usize,
    inconsistent: usize,
}

impl Aggregator {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            series: TickerSeries::new(symbol),
            rows: 0,
            replaced: 0,
            inconsistent: 0,
        }
    }

    /// Parse `body` and insert its minutes. Returns the number of rows read.
    ///
    /// A minute already present (from this or an earlier payload) is replaced.
    /// Points whose high/low do not bound open/close are kept as published and
    /// counted in [`Aggregator::inconsistent`].
    pub fn ingest(&mut self, label: &str, body: &[u8]) -> Result<usize, DataError> {
        let records = parse_payload(label, body)?;
        for record in &records {
            if !record.point.is_sane() {
                self.inconsistent += 1;
                warn!(
                    symbol = %self.series.symbol,
                    slice = label,
                    time = %record.timestamp,
                    "high/low range does not contain open/close"
                );
            }
            if self
                .series
                .insert_point(record.date(), record.key(), record.point)
                .is_some()
            {
                self.replaced += 1;
            }
        }
        self.rows += records.len();
        debug!(symbol = %self.series.symbol, slice = label, rows = records.len(), "ingested payload");
        Ok(records.len())
    }

    /// Rows ingested so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Rows that replaced an existing minute.
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Rows whose high/low range did not contain open and close.
    pub fn inconsistent(&self) -> usize {
        self.inconsistent
    }

    /// Compute every rollup and hand over the tree.
    pub fn finish(mut self) -> TickerSeries {
        roll_up_series(&mut self.series);
        self.series
    }

    /// Ingest every payload and finish. The first parse error aborts the build.
    pub fn build<I>(symbol: impl Into<String>, payloads: I) -> Result<TickerSeries, DataError>
    where
        I: IntoIterator<Item = RawSlice>,
    {
        let mut aggregator = Self::new(symbol);
        for slice in payloads {
            aggregator.ingest(&slice.id.label(), &slice.body)?;
        }
        Ok(aggregator.finish())
    }
}
