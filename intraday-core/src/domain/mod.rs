//! Domain types: minute keys, price points and the aggregate tree.

pub mod minute;
pub mod price;
pub mod series;

pub use minute::{MinuteKey, MinuteKeyError};
pub use price::{truncate_cents, PricePoint};
pub use series::{DayAggregate, MonthAggregate, Rollup, TickerSeries, YearAggregate};
