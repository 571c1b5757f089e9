//! TAQ file header and the trading-day base timestamp.
//!
//! The header is the first line of a record file. Bytes 2..4 hold the month,
//! 4..6 the day and 6..10 the year; the decimal record count follows a `:`.
//! The header's own byte length, terminator included, is the record line
//! length for the rest of the file.
use jiff::civil;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::error::{Result, TaqError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    /// Row count declared by the file.
    pub record_count: u64,
    /// Bytes per record line.
    pub line_length: usize,
}

fn digits(line: &[u8], start: usize, end: usize, what: &str) -> Result<u32> {
    let raw = line
        .get(start..end)
        .ok_or_else(|| TaqError::malformed(format!("header too short for {what}")))?;
    if !raw.iter().all(u8::is_ascii_digit) {
        return Err(TaqError::malformed(format!("{what} is not decimal: {:?}", String::from_utf8_lossy(raw))));
    }
    Ok(raw.iter().fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0')))
}

impl Header {
    /// Parse one raw header line, terminator included.
    pub fn parse(line: &[u8]) -> Result<Header> {
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| TaqError::malformed("missing `:` separator"))?;
        let (datestr, rest) = (&line[..colon], &line[colon + 1..]);

        let month = digits(datestr, 2, 4, "month")? as u8;
        let day = digits(datestr, 4, 6, "day")? as u8;
        let year = digits(datestr, 6, 10, "year")? as i32;

        let count = rest.trim_ascii();
        if count.is_empty() || !count.iter().all(u8::is_ascii_digit) {
            return Err(TaqError::malformed(format!("record count is not decimal: {:?}", String::from_utf8_lossy(count))));
        }
        let record_count = std::str::from_utf8(count)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| TaqError::malformed("record count out of range"))?;

        let header = Header { year, month, day, record_count, line_length: line.len() };
        header.date()?;
        Ok(header)
    }

    /// Calendar date of the trading session.
    pub fn date(&self) -> Result<Date> {
        let month = Month::try_from(self.month).map_err(|_| TaqError::malformed(format!("month {} out of range", self.month)))?;
        Date::from_calendar_date(self.year, month, self.day)
            .map_err(|e| TaqError::malformed(format!("invalid date {}-{:02}-{:02}: {e}", self.year, self.month, self.day)))
    }

    pub fn base_time(&self) -> Result<BaseTimestamp> {
        BaseTimestamp::eastern_midnight(self.date()?)
    }
}

/// Local midnight of a trading day in US Eastern time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseTimestamp {
    /// Seconds since the Unix epoch.
    pub epoch_seconds: i64,
    /// Offset from UTC in effect at that midnight.
    pub utc_offset_seconds: i32,
}

/// Exchange time zone of NYSE TAQ sessions.
pub const EXCHANGE_TZ: &str = "America/New_York";

impl BaseTimestamp {
    pub fn eastern_midnight(date: Date) -> Result<BaseTimestamp> {
        let tz = TimeZone::get(EXCHANGE_TZ)?;
        let civil = civil::Date::new(date.year() as i16, u8::from(date.month()) as i8, date.day() as i8)?;
        let zoned = civil.to_datetime(civil::Time::midnight()).to_zoned(tz)?;
        Ok(BaseTimestamp { epoch_seconds: zoned.timestamp().as_second(), utc_offset_seconds: zoned.offset().seconds() })
    }

    pub fn epoch_millis(&self) -> i64 {
        self.epoch_seconds * 1000
    }

    /// Add an intraday offset given as the decoded clock fields. `None` if
    /// the result does not fit in epoch milliseconds.
    pub fn at(&self, hour: u64, minute: u64, second: u64, millis: u64) -> Option<i64> {
        let offset_ms = hour
            .checked_mul(60)?
            .checked_add(minute)?
            .checked_mul(60)?
            .checked_add(second)?
            .checked_mul(1000)?
            .checked_add(millis)?;
        self.epoch_seconds.checked_mul(1000)?.checked_add(i64::try_from(offset_ms).ok()?)
    }
}
