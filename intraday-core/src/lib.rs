//! Intraday Core: minute-data slice fetching and OHLCV rollups.
//!
//! This crate contains:
//! - Domain types (minute keys, price points, the year/month/day aggregate tree)
//! - The regular-session filter
//! - A bounded-concurrency fetcher with a shared ban window and retry
//! - Slice orchestration for the 24 monthly slices of a symbol
//! - CSV parsing and bottom-up rollups
//! - TOML configuration and the company-table universe

pub mod aggregate;
pub mod config;
pub mod data;
pub mod domain;
pub mod pipeline;
pub mod session;

pub use aggregate::Aggregator;
pub use config::{ConfigError, IntradayConfig};
pub use data::{DataError, RateLimitedFetcher, SliceOrchestrator};
pub use domain::{MinuteKey, PricePoint, Rollup, TickerSeries};
pub use pipeline::fetch_ticker_series;
