//! CSV payload parsing into minute records.

use crate::data::DataError;
use crate::domain::{MinuteKey, PricePoint};
use chrono::{NaiveDate, NaiveDateTime};

/// Timestamp layout of the `time` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Columns per data row: time, open, high, low, close, volume.
pub const FIELD_COUNT: usize = 6;

/// One parsed data row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinuteRecord {
    pub timestamp: NaiveDateTime,
    pub point: PricePoint,
}

impl MinuteRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn key(&self) -> MinuteKey {
        MinuteKey::from(self.timestamp.time())
    }
}

/// Parse one slice payload. The first row is the header and is skipped.
///
/// Any malformed row fails the whole payload with the slice label and the
/// 1-based line number of the offending row.
pub fn parse_payload(label: &str, body: &[u8]) -> Result<Vec<MinuteRecord>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();
    loop {
        let more = rdr.read_record(&mut row).map_err(|e| DataError::Parse {
            slice: label.to_string(),
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        })?;
        if !more {
            break;
        }
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let record = parse_row(&row).map_err(|reason| DataError::Parse {
            slice: label.to_string(),
            line,
            reason,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn parse_row(row: &csv::StringRecord) -> Result<MinuteRecord, String> {
    if row.len() != FIELD_COUNT {
        return Err(format!("expected {FIELD_COUNT} fields, found {}", row.len()));
    }

    let timestamp = NaiveDateTime::parse_from_str(&row[0], TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp {:?}: {e}", &row[0]))?;

    let price = |col: usize, name: &str| -> Result<f64, String> {
        let raw = &row[col];
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(format!("bad {name} {raw:?}")),
        }
    };
    let open = price(1, "open")?;
    let high = price(2, "high")?;
    let low = price(3, "low")?;
    let close = price(4, "close")?;
    let volume = row[5]
        .parse::<u64>()
        .map_err(|e| format!("bad volume {:?}: {e}", &row[5]))?;

    Ok(MinuteRecord {
        timestamp,
        point: PricePoint::from_raw(open, high, low, close, volume),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "time,open,high,low,close,volume\n";

    #[test]
    fn parses_rows_and_truncates_prices() {
        let body = format!("{HEADER}2023-01-03 09:31:00,10.009,10.5,9.999,10.2,1000\n");
        let records = parse_payload("year1month1", body.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let r = records[0];
        assert_eq!(r.date(), NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(r.key(), MinuteKey::new(9, 31).unwrap());
        assert_eq!(r.point.open, 10.0);
        assert_eq!(r.point.high, 10.5);
        assert_eq!(r.point.low, 9.99);
        assert_eq!(r.point.volume, 1000);
    }

    #[test]
    fn header_only_payload_is_empty() {
        assert!(parse_payload("year2month12", HEADER.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn wrong_field_count_reports_line() {
        let body = format!(
            "{HEADER}2023-01-03 09:31:00,1,1,1,1,1\n2023-01-03 09:32:00,1,1,1,1\n"
        );
        match parse_payload("year1month2", body.as_bytes()) {
            Err(DataError::Parse { slice, line, reason }) => {
                assert_eq!(slice, "year1month2");
                assert_eq!(line, 3);
                assert!(reason.contains("expected 6 fields"), "{reason}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let body = format!("{HEADER}2023/01/03 09:31,1,1,1,1,1\n");
        let err = parse_payload("year1month1", body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("bad timestamp"), "{err}");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        for row in [
            "2023-01-03 09:31:00,abc,1,1,1,1",
            "2023-01-03 09:31:00,1,1,1,NaN,1",
            "2023-01-03 09:31:00,1,1,1,1,-5",
            "2023-01-03 09:31:00,1,1,1,1,1.5",
        ] {
            let body = format!("{HEADER}{row}\n");
            assert!(
                matches!(
                    parse_payload("year1month1", body.as_bytes()),
                    Err(DataError::Parse { line: 2, .. })
                ),
                "{row}"
            );
        }
    }
}
