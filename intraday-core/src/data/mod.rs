//! Data acquisition: provider types, transport, rate-limited fetching, slices, universe.

pub mod ban_window;
pub mod fetcher;
pub mod provider;
pub mod slices;
pub mod transport;
pub mod universe;

pub use ban_window::BanWindow;
pub use fetcher::{check_payload, redact_api_key, FetchStats, PendingFetch, RateLimitedFetcher};
pub use provider::{
    ConsoleProgress, DataError, RawSlice, SliceId, SymbolProgress, SLICE_COUNT, SLICE_MONTHS,
    SLICE_YEARS,
};
pub use slices::{AlphaVantageEndpoint, SliceOrchestrator, SliceSet};
pub use transport::{HttpTransport, Transport};
pub use universe::{Company, SelectionRule, Universe};
