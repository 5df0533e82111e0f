//! PricePoint: one calendar minute's trade summary.

use serde::{Deserialize, Serialize};

/// Truncate a price to two decimal places by flooring.
///
/// `10.239` becomes `10.23`, `-0.001` becomes `-0.01`. Applied once at ingestion;
/// rollups never re-truncate.
#[inline]
pub fn truncate_cents(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

/// OHLCV summary for a single minute.
///
/// Prices are stored already truncated to cents (see [`truncate_cents`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

impl PricePoint {
    /// Build a point from raw provider values, truncating every price to cents.
    pub fn from_raw(open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            open: truncate_cents(open),
            close: truncate_cents(close),
            high: truncate_cents(high),
            low: truncate_cents(low),
            volume,
        }
    }

    /// Basic sanity check: high is the top of the range and low the bottom.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_floors_instead_of_rounding() {
        assert_eq!(truncate_cents(10.239), 10.23);
        assert_eq!(truncate_cents(10.999), 10.99);
        assert_eq!(truncate_cents(10.5), 10.5);
        assert_eq!(truncate_cents(-0.001), -0.01);
    }

    #[test]
    fn from_raw_truncates_prices_but_not_volume() {
        let p = PricePoint::from_raw(10.129, 10.555, 9.901, 10.2049, 1234);
        assert_eq!(p.open, 10.12);
        assert_eq!(p.high, 10.55);
        assert_eq!(p.low, 9.9);
        assert_eq!(p.close, 10.2);
        assert_eq!(p.volume, 1234);
    }

    #[test]
    fn sanity_check_detects_inverted_range() {
        let mut p = PricePoint::from_raw(10.0, 10.5, 9.9, 10.2, 1);
        assert!(p.is_sane());
        p.high = 9.0;
        assert!(!p.is_sane());
    }
}
