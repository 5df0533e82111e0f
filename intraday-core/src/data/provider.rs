//! Shared data-layer types: structured errors, slice identity, progress reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of year offsets the extended intraday endpoint serves.
pub const SLICE_YEARS: u32 = 2;

/// Months per year offset.
pub const SLICE_MONTHS: u32 = 12;

/// Slices per symbol.
pub const SLICE_COUNT: usize = (SLICE_YEARS * SLICE_MONTHS) as usize;

/// Structured error types for data operations.
///
/// These are designed to be displayable in both CLI and log contexts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("provider returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("malformed payload ({len} bytes): {reason}")]
    MalformedPayload { len: usize, reason: String },

    #[error("provider throttled the request: {0}")]
    Throttled(String),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("request cancelled: fetcher is shutting down")]
    Cancelled,

    #[error("parse error in slice {slice}, line {line}: {reason}")]
    Parse {
        slice: String,
        line: u64,
        reason: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("universe error: {0}")]
    Universe(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether the fetcher recovers from this error by banning and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::HttpStatus { .. }
                | DataError::MalformedPayload { .. }
                | DataError::Throttled(_)
        )
    }
}

/// One monthly slice of the extended intraday endpoint.
///
/// `year` is the offset back from today (1 or 2), `month` the month within that
/// year offset (1..=12). `year1month1` is the most recent month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SliceId {
    year: u32,
    month: u32,
}

impl SliceId {
    pub fn new(year: u32, month: u32) -> Result<Self, DataError> {
        if !(1..=SLICE_YEARS).contains(&year) || !(1..=SLICE_MONTHS).contains(&month) {
            return Err(DataError::InvalidRequest(format!(
                "slice year{year}month{month} outside year1..{SLICE_YEARS} month1..{SLICE_MONTHS}"
            )));
        }
        Ok(Self { year, month })
    }

    /// All slices, most recent first (index order).
    pub fn all() -> impl Iterator<Item = SliceId> {
        (1..=SLICE_YEARS).flat_map(|year| (1..=SLICE_MONTHS).map(move |month| SliceId { year, month }))
    }

    /// Slice at a given index; `0` is `year1month1`, `23` is `year2month12`.
    pub fn from_index(index: usize) -> Option<SliceId> {
        if index >= SLICE_COUNT {
            return None;
        }
        let i = index as u32;
        Some(SliceId {
            year: i / SLICE_MONTHS + 1,
            month: i % SLICE_MONTHS + 1,
        })
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Position in the ordered slice list: `(year - 1) * 12 + (month - 1)`.
    pub fn index(&self) -> usize {
        ((self.year - 1) * SLICE_MONTHS + (self.month - 1)) as usize
    }

    /// Provider label, e.g. `year1month3`.
    pub fn label(&self) -> String {
        format!("year{}month{}", self.year, self.month)
    }
}

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year{}month{}", self.year, self.month)
    }
}

/// Raw CSV payload for one slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSlice {
    pub id: SliceId,
    pub body: Vec<u8>,
}

/// Per-symbol progress of a fetch run.
///
/// `position` is 1-based and counts symbols in the order they were started.
pub trait SymbolProgress: Send + Sync {
    fn symbol_started(&self, symbol: &str, position: usize, total: usize);

    /// The symbol's slices were fetched, aggregated and written, or it failed.
    fn symbol_finished(&self, symbol: &str, result: &Result<(), DataError>);

    fn run_finished(&self, written: usize, total: usize);
}

/// Prints one line per event to stdout.
pub struct ConsoleProgress;

impl SymbolProgress for ConsoleProgress {
    fn symbol_started(&self, symbol: &str, position: usize, total: usize) {
        println!("({position} of {total}) {symbol}: requesting {SLICE_COUNT} slices");
    }

    fn symbol_finished(&self, symbol: &str, result: &Result<(), DataError>) {
        match result {
            Ok(()) => println!("{symbol}: series written"),
            Err(e) => println!("{symbol}: gave up ({e})"),
        }
    }

    fn run_finished(&self, written: usize, total: usize) {
        println!("{}", run_summary(written, total));
    }
}

fn run_summary(written: usize, total: usize) -> String {
    let missing = total.saturating_sub(written);
    if missing == 0 {
        format!("all {total} series written")
    } else {
        format!("{written} of {total} series written, {missing} missing")
    }
}
