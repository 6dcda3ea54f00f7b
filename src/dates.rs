use crate::error::RangeError;
use chrono::NaiveDate;

/// `YYYYMMDD` day identifier, the same form the reporting API uses for the
/// `date` dimension.
pub type DateKey = String;

const INPUT_FORMAT: &str = "%Y-%m-%d";
const KEY_FORMAT: &str = "%Y%m%d";

/// Parse a `YYYY-MM-DD` bound.
pub fn parse_date(raw: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(raw.trim(), INPUT_FORMAT)
        .map_err(|_| RangeError::InvalidDate(raw.to_string()))
}

/// `YYYY-MM-DD`, the form the reporting API expects in date ranges.
pub fn iso_date(date: NaiveDate) -> String {
    date.format(INPUT_FORMAT).to_string()
}

pub fn date_key(date: NaiveDate) -> DateKey {
    date.format(KEY_FORMAT).to_string()
}

/// Every day from `start` to `end` inclusive, ascending, as [`DateKey`]s.
pub fn date_range(start: &str, end: &str) -> Result<Vec<DateKey>, RangeError> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    date_keys(start, end)
}

pub fn date_keys(start: NaiveDate, end: NaiveDate) -> Result<Vec<DateKey>, RangeError> {
    if start > end {
        return Err(RangeError::Reversed { start, end });
    }
    Ok(start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(date_key)
        .collect())
}
