//! Civil UTC timestamps
//!
//! A [`Timestamp`] is a whole number of seconds since the Unix epoch, held in
//! an `i64`. Any year whose offset from 1900 fits the 4-byte stored field is
//! representable. That range is far wider than `chrono` covers, so
//! [`Timestamp::to_datetime`] can fail.
//!
//! Calendar math is the proleptic Gregorian days-from-civil conversion that
//! `timegm` performs, carried out in 64-bit integers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Calendar year that a stored year offset of zero stands for
pub const YEAR_BASE: i64 = 1900;

const SECS_PER_DAY: i64 = 86_400;

/// Days between 0000-03-01 and 1970-01-01
const EPOCH_SHIFT_DAYS: i64 = 719_468;

const DAYS_PER_ERA: i64 = 146_097;

/// Second-precision point in time, UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
}

/// Broken-down UTC calendar fields of a [`Timestamp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Civil {
    pub year: i64,
    /// 1-based
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// The current time, truncated to whole seconds
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Build from seconds since 1970-01-01T00:00:00Z.
    ///
    /// Returns `None` if the year minus 1900 does not fit in an `i32`.
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        let year = civil_from_days(secs.div_euclid(SECS_PER_DAY)).0;
        i32::try_from(year - YEAR_BASE).ok()?;
        Some(Self { secs })
    }

    /// Build from stored calendar fields, normalizing them like `timegm`.
    ///
    /// A month past December rolls into the next year, day 0 is the last day
    /// of the previous month and oversized hour/minute/second values carry.
    /// Returns `None` only when that carry leaves the `i32` year offset range.
    pub fn from_fields(
        year_offset: i32,
        month0: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        let months = (YEAR_BASE + i64::from(year_offset)) * 12 + i64::from(month0);
        let year = months.div_euclid(12);
        let month = months.rem_euclid(12) + 1;

        let days = days_from_civil(year, month, 1) + i64::from(day) - 1;
        let secs = days * SECS_PER_DAY
            + i64::from(hour) * 3_600
            + i64::from(minute) * 60
            + i64::from(second);

        Self::from_unix_seconds(secs)
    }

    /// Seconds since 1970-01-01T00:00:00Z
    pub fn unix_seconds(&self) -> i64 {
        self.secs
    }

    pub fn civil(&self) -> Civil {
        let days = self.secs.div_euclid(SECS_PER_DAY);
        let of_day = self.secs.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);

        Civil {
            year,
            month: month as u8,
            day: day as u8,
            hour: (of_day / 3_600) as u8,
            minute: (of_day % 3_600 / 60) as u8,
            second: (of_day % 60) as u8,
        }
    }

    /// Year minus 1900, as stored on disk
    pub fn year_offset(&self) -> i32 {
        // Every constructor checks that the offset fits
        (self.civil().year - YEAR_BASE) as i32
    }

    /// The same instant as a chrono value, if chrono can represent its year
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs, 0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    /// Drops sub-second precision. chrono's year range lies well inside ours.
    fn from(datetime: DateTime<Utc>) -> Self {
        Self {
            secs: datetime.timestamp(),
        }
    }
}

impl fmt::Display for Timestamp {
    /// `YYYY-MM-DDTHH:MM:SSZ`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.civil();
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            c.year, c.month, c.day, c.hour, c.minute, c.second
        )
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Days since 1970-01-01 of the given proleptic Gregorian date (month 1-12)
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let shifted_month = (month + 9) % 12;
    let day_of_year = (153 * shifted_month + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;

    era * DAYS_PER_ERA + day_of_era - EPOCH_SHIFT_DAYS
}

/// Inverse of [`days_from_civil`]: `(year, month 1-12, day 1-31)`
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let days = days + EPOCH_SHIFT_DAYS;
    let era = days.div_euclid(DAYS_PER_ERA);
    let day_of_era = days - era * DAYS_PER_ERA;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = year_of_era + era * 400 + i64::from(month <= 2);

    (year, month, day)
}

