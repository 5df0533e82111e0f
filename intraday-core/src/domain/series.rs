//! The year → month → day → minute aggregate tree.
//!
//! Every level owns its children exclusively (`BTreeMap` by value), so the tree
//! has no shared pointers and iterates in key order. Nodes are created on first
//! access through the `*_mut` get-or-insert helpers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::minute::MinuteKey;
use super::price::PricePoint;

/// Open/close/high/low/volume summary of one node.
///
/// `minutes` is the number of in-session minutes the summary covers. A node with
/// `minutes == 0` is degenerate: none of its minutes fell inside the session and
/// every price field is left at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub minutes: u64,
}

impl Rollup {
    pub fn is_degenerate(&self) -> bool {
        self.minutes == 0
    }
}

/// One trading day: its minutes plus the session rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayAggregate {
    pub rollup: Rollup,
    pub points: BTreeMap<MinuteKey, PricePoint>,
}

impl DayAggregate {
    /// Insert a minute, replacing any point already stored under the same key.
    pub fn insert(&mut self, key: MinuteKey, point: PricePoint) -> Option<PricePoint> {
        self.points.insert(key, point)
    }

    /// Minutes inside the regular session, in chronological order.
    pub fn session_points(&self) -> impl Iterator<Item = (&MinuteKey, &PricePoint)> {
        self.points.iter().filter(|(key, _)| key.is_in_session())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthAggregate {
    pub rollup: Rollup,
    pub days: BTreeMap<u32, DayAggregate>,
}

impl MonthAggregate {
    pub fn day_mut(&mut self, day: u32) -> &mut DayAggregate {
        self.days.entry(day).or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearAggregate {
    pub rollup: Rollup,
    pub months: BTreeMap<u32, MonthAggregate>,
}

impl YearAggregate {
    pub fn month_mut(&mut self, month: u32) -> &mut MonthAggregate {
        self.months.entry(month).or_default()
    }
}

/// Root of the tree for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSeries {
    pub symbol: String,
    pub years: BTreeMap<i32, YearAggregate>,
}

impl TickerSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            years: BTreeMap::new(),
        }
    }

    pub fn year_mut(&mut self, year: i32) -> &mut YearAggregate {
        self.years.entry(year).or_default()
    }

    /// Insert one minute, creating the year/month/day nodes as needed.
    ///
    /// Returns the point previously stored for the same minute, if any.
    pub fn insert_point(
        &mut self,
        date: NaiveDate,
        key: MinuteKey,
        point: PricePoint,
    ) -> Option<PricePoint> {
        self.year_mut(date.year())
            .month_mut(date.month())
            .day_mut(date.day())
            .insert(key, point)
    }

    pub fn year(&self, year: i32) -> Option<&YearAggregate> {
        self.years.get(&year)
    }

    pub fn month(&self, year: i32, month: u32) -> Option<&MonthAggregate> {
        self.year(year)?.months.get(&month)
    }

    pub fn day(&self, year: i32, month: u32, day: u32) -> Option<&DayAggregate> {
        self.month(year, month)?.days.get(&day)
    }

    /// Total number of stored minutes, in session or not.
    pub fn minute_count(&self) -> usize {
        self.days().map(|d| d.points.len()).sum()
    }

    /// Total number of day nodes.
    pub fn day_count(&self) -> usize {
        self.days().count()
    }

    fn days(&self) -> impl Iterator<Item = &DayAggregate> {
        self.years
            .values()
            .flat_map(|y| y.months.values())
            .flat_map(|m| m.days.values())
    }

    /// Content hash of the whole tree (blake3 over the canonical JSON form).
    ///
    /// Maps are ordered, so two structurally identical trees hash identically.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).expect("TickerSeries must serialize");
        blake3::hash(&json).to_hex().to_string()
    }
}
