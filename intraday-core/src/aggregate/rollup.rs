//! Bottom-up rollups over the aggregate tree.
//!
//! Days summarize their in-session minutes. Months and years summarize their
//! children: open comes from the child with the smallest key, close from the
//! child with the largest key, and high/low/volume fold over the children that
//! have data. Keys are day-of-month and month number, so ordering never crosses
//! a parent boundary.

use crate::domain::{DayAggregate, MonthAggregate, Rollup, TickerSeries, YearAggregate};

/// Summarize a day's in-session minutes.
///
/// Minutes outside the session stay in `day.points` but are ignored here. A day
/// without any in-session minute yields the zero rollup.
pub fn roll_up_day(day: &DayAggregate) -> Rollup {
    let mut rollup = Rollup::default();
    for (_, point) in day.session_points() {
        if rollup.minutes == 0 {
            rollup.open = point.open;
            rollup.high = point.high;
            rollup.low = point.low;
        } else {
            rollup.high = rollup.high.max(point.high);
            rollup.low = rollup.low.min(point.low);
        }
        // Points iterate in MinuteKey order, so the last one seen is the close.
        rollup.close = point.close;
        rollup.volume += point.volume;
        rollup.minutes += 1;
    }
    rollup
}

/// Combine child rollups given in ascending key order.
fn combine<'a>(children: impl IntoIterator<Item = &'a Rollup>) -> Rollup {
    let mut rollup = Rollup::default();
    let mut first = true;
    let mut seen_data = false;

    for child in children {
        if first {
            rollup.open = child.open;
            first = false;
        }
        rollup.close = child.close;

        if child.is_degenerate() {
            continue;
        }
        if seen_data {
            rollup.high = rollup.high.max(child.high);
            rollup.low = rollup.low.min(child.low);
        } else {
            rollup.high = child.high;
            rollup.low = child.low;
            seen_data = true;
        }
        rollup.volume += child.volume;
        rollup.minutes += child.minutes;
    }
    rollup
}

/// Summarize a month from its days' rollups (which must already be computed).
pub fn roll_up_month(month: &MonthAggregate) -> Rollup {
    combine(month.days.values().map(|d| &d.rollup))
}

/// Summarize a year from its months' rollups (which must already be computed).
pub fn roll_up_year(year: &YearAggregate) -> Rollup {
    combine(year.months.values().map(|m| &m.rollup))
}

/// Recompute every rollup in the tree, days first.
pub fn roll_up_series(series: &mut TickerSeries) {
    for year in series.years.values_mut() {
        for month in year.months.values_mut() {
            for day in month.days.values_mut() {
                day.rollup = roll_up_day(day);
            }
            month.rollup = roll_up_month(month);
        }
        year.rollup = roll_up_year(year);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MinuteKey, PricePoint};

    fn key(h: u32, m: u32) -> MinuteKey {
        MinuteKey::new(h, m).unwrap()
    }

    fn pt(open: f64, high: f64, low: f64, close: f64, volume: u64) -> PricePoint {
        PricePoint::from_raw(open, high, low, close, volume)
    }

    fn rollup(open: f64, close: f64, high: f64, low: f64, volume: u64) -> Rollup {
        Rollup {
            open,
            close,
            high,
            low,
            volume,
            minutes: 1,
        }
    }

    #[test]
    fn day_uses_only_session_minutes() {
        let mut day = DayAggregate::default();
        day.insert(key(9, 30), pt(1.0, 99.0, 0.5, 1.0, 9999));
        day.insert(key(9, 31), pt(10.0, 10.5, 9.9, 10.2, 1000));
        day.insert(key(12, 0), pt(10.2, 11.0, 10.1, 10.3, 200));
        day.insert(key(16, 0), pt(10.3, 10.4, 10.1, 10.25, 500));
        day.insert(key(16, 1), pt(50.0, 60.0, 0.1, 50.0, 7777));

        let r = roll_up_day(&day);
        assert_eq!(r.open, 10.0);
        assert_eq!(r.close, 10.25);
        assert_eq!(r.high, 11.0);
        assert_eq!(r.low, 9.9);
        assert_eq!(r.volume, 1700);
        assert_eq!(r.minutes, 3);
    }

    #[test]
    fn day_without_session_minutes_is_degenerate() {
        let mut day = DayAggregate::default();
        day.insert(key(8, 0), pt(1.0, 2.0, 0.5, 1.5, 10));
        day.insert(key(18, 30), pt(1.0, 2.0, 0.5, 1.5, 10));
        let r = roll_up_day(&day);
        assert!(r.is_degenerate());
        assert_eq!(r, Rollup::default());
    }

    #[test]
    fn month_anchors_on_smallest_and_largest_day() {
        let mut month = MonthAggregate::default();
        month.day_mut(17).rollup = rollup(17.0, 17.5, 18.0, 16.0, 10);
        month.day_mut(3).rollup = rollup(3.0, 3.5, 4.0, 2.0, 20);
        month.day_mut(30).rollup = rollup(30.0, 30.5, 31.0, 29.0, 30);

        let r = roll_up_month(&month);
        assert_eq!(r.open, 3.0);
        assert_eq!(r.close, 30.5);
        assert_eq!(r.high, 31.0);
        assert_eq!(r.low, 2.0);
        assert_eq!(r.volume, 60);
        assert_eq!(r.minutes, 3);
    }

    #[test]
    fn degenerate_days_do_not_pull_low_to_zero() {
        let mut month = MonthAggregate::default();
        month.day_mut(2).rollup = rollup(5.0, 5.5, 6.0, 4.0, 10);
        month.day_mut(9).rollup = Rollup::default();

        let r = roll_up_month(&month);
        assert_eq!(r.low, 4.0);
        assert_eq!(r.high, 6.0);
        assert_eq!(r.volume, 10);
        // Close still anchors on the largest day present.
        assert_eq!(r.close, 0.0);
    }

    #[test]
    fn year_folds_months() {
        let mut year = YearAggregate::default();
        year.month_mut(12).rollup = rollup(12.0, 12.5, 13.0, 11.0, 5);
        year.month_mut(1).rollup = rollup(1.0, 1.5, 2.0, 0.5, 7);

        let r = roll_up_year(&year);
        assert_eq!(r.open, 1.0);
        assert_eq!(r.close, 12.5);
        assert_eq!(r.high, 13.0);
        assert_eq!(r.low, 0.5);
        assert_eq!(r.volume, 12);
    }

    #[test]
    fn empty_parent_is_degenerate() {
        assert!(roll_up_month(&MonthAggregate::default()).is_degenerate());
        assert!(roll_up_year(&YearAggregate::default()).is_degenerate());
    }
}
