//! Currency codes, pairs and rate dates.

use crate::error::{FxError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First date for which reference rates are published.
pub const FIRST_RATE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1999, 1, 4) {
    Some(date) => date,
    None => panic!("invalid first rate date"),
};

/// Default start of a time series when only the end date is given.
pub const SERIES_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(2005, 1, 31) {
    Some(date) => date,
    None => panic!("invalid series epoch"),
};

/// Wire format for rate dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// ISO 4217-style currency code: three ASCII letters, upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a code, trimming whitespace and normalizing case.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_field("currency", raw)
    }

    /// Parse a code, reporting failures against `field`.
    pub fn parse_field(field: &str, raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FxError::validation(
                field,
                format!("'{}' is not a three-letter currency code", trimmed),
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = FxError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A conversion direction between two distinct currencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(from: CurrencyCode, to: CurrencyCode) -> Result<Self> {
        if from == to {
            return Err(FxError::validation(
                "to",
                format!("cannot convert {} into itself", from),
            ));
        }
        Ok(Self { from, to })
    }

    /// Parse both sides from raw query values.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        Self::new(
            CurrencyCode::parse_field("from", from)?,
            CurrencyCode::parse_field("to", to)?,
        )
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Parse a `YYYY-MM-DD` date and check it lies between the first published
/// rate and `today`.
pub fn parse_rate_date(field: &str, raw: &str, today: NaiveDate) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        FxError::validation(field, format!("'{}' is not a YYYY-MM-DD date", raw.trim()))
    })?;
    if date < FIRST_RATE_DATE {
        return Err(FxError::validation(
            field,
            format!("no rates are published before {}", FIRST_RATE_DATE),
        ));
    }
    if date > today {
        return Err(FxError::validation(
            field,
            format!("{} is in the future", date),
        ));
    }
    Ok(date)
}

/// Inclusive date range for a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FxError::validation(
                "fromDate",
                format!("{} is after {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    /// Range from [`SERIES_EPOCH`] to `end`, clamped so a pre-epoch end date
    /// still yields a one-day range.
    pub fn ending_at(end: NaiveDate) -> Self {
        Self {
            start: SERIES_EPOCH.min(end),
            end,
        }
    }

    /// Upstream path segment, e.g. `2020-01-01..2020-02-01`.
    pub fn path_segment(&self) -> String {
        format!(
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Today's date in UTC, the calendar the reference rates are published in.
pub fn today_utc() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
