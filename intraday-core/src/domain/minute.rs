//! MinuteKey: a wall-clock minute within a trading day.

use chrono::{NaiveTime, Timelike};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::session;

/// (hour, minute) pair, ordered lexicographically.
///
/// The derived `Ord` is the only ordering used for sorting minutes and for picking
/// the first/last in-session minute of a day. Field order matters: hour first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteKey {
    hour: u8,
    minute: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MinuteKeyError {
    #[error("hour {0} out of range 0..=23")]
    Hour(u32),

    #[error("minute {0} out of range 0..=59")]
    Minute(u32),

    #[error("expected HH:MM, got '{0}'")]
    Format(String),
}

impl MinuteKey {
    pub fn new(hour: u32, minute: u32) -> Result<Self, MinuteKeyError> {
        if hour > 23 {
            return Err(MinuteKeyError::Hour(hour));
        }
        if minute > 59 {
            return Err(MinuteKeyError::Minute(minute));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.hour)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minute)
    }

    /// Minutes since midnight.
    pub fn minute_of_day(&self) -> u32 {
        self.hour() * 60 + self.minute()
    }

    /// Whether this minute belongs to the regular trading session.
    pub fn is_in_session(&self) -> bool {
        session::is_in_session(self.hour(), self.minute())
    }
}

// Seconds are dropped; chrono guarantees hour/minute are in range.
impl From<NaiveTime> for MinuteKey {
    fn from(t: NaiveTime) -> Self {
        Self {
            hour: t.hour() as u8,
            minute: t.minute() as u8,
        }
    }
}

impl fmt::Display for MinuteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for MinuteKey {
    type Err = MinuteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| MinuteKeyError::Format(s.to_string()))?;
        let hour = h
            .trim()
            .parse::<u32>()
            .map_err(|_| MinuteKeyError::Format(s.to_string()))?;
        let minute = m
            .trim()
            .parse::<u32>()
            .map_err(|_| MinuteKeyError::Format(s.to_string()))?;
        Self::new(hour, minute)
    }
}

// Serialized as "HH:MM" so the key works as a JSON object key.
impl Serialize for MinuteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = MinuteKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a minute key formatted as HH:MM")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MinuteKey, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}
