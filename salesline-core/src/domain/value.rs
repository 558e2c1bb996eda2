//! Value normalizers
//!
//! Pure functions turning raw cell values into dates, amounts, quantities and
//! branch codes. None of them fail: unparseable input degrades to `None` for
//! dates and to zero for numbers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use super::row::RawValue;

/// Days between the spreadsheet epoch (1899-12-30) and the unix epoch
const SPREADSHEET_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const MS_PER_DAY: f64 = 86_400_000.0;

static CURRENCY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"R\$\s?").unwrap());

static LEADING_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").unwrap());

static LEADING_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+").unwrap());

/// Parse a date from a date value, spreadsheet serial, `dd/mm/yyyy` string or
/// an ISO-like string
pub fn parse_date(value: &RawValue) -> Option<NaiveDate> {
    match value {
        RawValue::Null => None,
        RawValue::Date(d) => Some(*d),
        RawValue::Number(n) => serial_to_date(*n),
        RawValue::Text(s) => parse_date_str(s),
    }
}

/// Convert a spreadsheet day serial to a calendar date
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let millis = ((serial - SPREADSHEET_EPOCH_OFFSET_DAYS) * MS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let parts: Vec<&str> = s.split('/').collect();
    if let [day, month, year] = parts.as_slice() {
        if day.len() == 2 && month.len() == 2 && year.len() == 4 {
            let d = day.parse().ok()?;
            let m = month.parse().ok()?;
            let y = year.parse().ok()?;
            return NaiveDate::from_ymd_opt(y, m, d);
        }
    }

    parse_generic_date(s)
}

fn parse_generic_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    let datetime_formats = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    for fmt in &date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    None
}

/// Parse a monetary or measured amount, defaulting to zero
///
/// Accepts Brazilian (`1.234,56`) and dot-decimal (`1234.56`, `1,234.56`)
/// conventions: whichever of `,` and `.` appears last is the decimal
/// separator.
pub fn parse_amount(value: &RawValue) -> Decimal {
    match value {
        RawValue::Number(n) => Decimal::try_from(*n).unwrap_or_default(),
        RawValue::Text(s) if !s.is_empty() => parse_amount_str(s),
        _ => Decimal::ZERO,
    }
}

fn parse_amount_str(s: &str) -> Decimal {
    let cleaned = CURRENCY_PREFIX.replace_all(s, "");
    let cleaned = cleaned.trim();

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let number = if last_comma > last_dot {
        cleaned.replace('.', "").replacen(',', ".", 1)
    } else if last_dot > last_comma {
        cleaned.replace(',', "")
    } else {
        cleaned.to_string()
    };

    let Some(m) = LEADING_DECIMAL.find(&number) else {
        return Decimal::ZERO;
    };
    let literal = m.as_str();

    if literal.contains(|c: char| c == 'e' || c == 'E') {
        return Decimal::from_scientific(literal).unwrap_or_default();
    }
    Decimal::from_str(literal.trim_end_matches('.')).unwrap_or_default()
}

/// Parse a sold quantity: the leading integer of the trimmed text, else zero
pub fn parse_quantity(value: &RawValue) -> i64 {
    match value {
        RawValue::Number(n) if n.is_finite() => n.trunc() as i64,
        RawValue::Text(s) => LEADING_INTEGER
            .find(s.trim())
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Normalize a branch code: trimmed, single digits zero-padded to two
pub fn normalize_branch(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => format!("0{}", c),
        _ => trimmed.to_string(),
    }
}
