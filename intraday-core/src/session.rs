//! Regular trading session window.
//!
//! The session runs 09:31 through 16:00, inclusive on both ends. The 09:30 bar
//! carries the opening auction and everything after 16:00 is after-hours, so both
//! are kept in the minute map but never feed a rollup.
//!
//! This is the only session predicate in the crate. Rollup inclusion and the
//! open/close anchor selection both go through it.

/// First minute of the regular session (hour, minute).
pub const SESSION_OPEN: (u32, u32) = (9, 31);

/// Last minute of the regular session (hour, minute).
pub const SESSION_CLOSE: (u32, u32) = (16, 0);

/// Whether `hour:minute` falls inside the regular trading session.
#[inline]
pub fn is_in_session(hour: u32, minute: u32) -> bool {
    if hour < SESSION_OPEN.0 || (hour == SESSION_OPEN.0 && minute < SESSION_OPEN.1) {
        return false;
    }
    if hour > SESSION_CLOSE.0 || (hour == SESSION_CLOSE.0 && minute > SESSION_CLOSE.1) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive() {
        assert!(is_in_session(9, 31));
        assert!(is_in_session(16, 0));
    }

    #[test]
    fn opening_auction_and_premarket_excluded() {
        assert!(!is_in_session(9, 30));
        assert!(!is_in_session(9, 0));
        assert!(!is_in_session(8, 59));
        assert!(!is_in_session(4, 0));
    }

    #[test]
    fn after_hours_excluded() {
        assert!(!is_in_session(16, 1));
        assert!(!is_in_session(17, 0));
        assert!(!is_in_session(19, 59));
    }

    #[test]
    fn midday_included() {
        assert!(is_in_session(10, 0));
        assert!(is_in_session(12, 30));
        assert!(is_in_session(15, 59));
        assert!(is_in_session(9, 59));
    }

    #[test]
    fn agrees_with_explicit_rule_for_every_minute() {
        for hour in 0..24 {
            for minute in 0..60 {
                let expected = !((hour < 9 || (hour == 9 && minute <= 30))
                    || (hour > 16 || (hour == 16 && minute > 0)));
                assert_eq!(is_in_session(hour, minute), expected, "{hour:02}:{minute:02}");
            }
        }
    }
}
