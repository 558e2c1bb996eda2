//! Untyped, field-keyed rows as read from an extract

use std::collections::HashMap;

use chrono::NaiveDate;

/// A single cell value before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

static NULL: RawValue = RawValue::Null;

impl RawValue {
    /// Text rendering used when a field is consumed as a string.
    ///
    /// Null and empty text both render as an empty string.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => format_number(*n),
            RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        RawValue::Date(d)
    }
}

/// Render a number without a trailing ".0" for whole values
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A field-keyed record with no identity beyond its position in the extract
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: HashMap<String, RawValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(field, text)` pairs; handy for fixtures
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), RawValue::from(v)))
            .collect()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: RawValue) {
        self.fields.insert(field.into(), value);
    }

    /// Overwrite a field with a text value
    pub fn set_text(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .insert(field.to_string(), RawValue::Text(value.into()));
    }

    /// Field value, or null when the field is absent
    pub fn get(&self, field: &str) -> &RawValue {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Field rendered as text, untrimmed
    pub fn text(&self, field: &str) -> String {
        self.get(field).as_text()
    }

    /// Field rendered as text with surrounding whitespace removed
    pub fn trimmed(&self, field: &str) -> String {
        self.text(field).trim().to_string()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, RawValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_reads_as_null() {
        let row = RawRow::from_pairs([("CODCLI", "123")]);
        assert!(row.get("FILIAL").is_null());
        assert_eq!(row.text("FILIAL"), "");
    }

    #[test]
    fn test_trimmed_and_untrimmed_text() {
        let row = RawRow::from_pairs([("NOME", "  JOAO  ")]);
        assert_eq!(row.text("NOME"), "  JOAO  ");
        assert_eq!(row.trimmed("NOME"), "JOAO");
    }

    #[test]
    fn test_number_and_date_rendering() {
        assert_eq!(RawValue::Number(42.0).as_text(), "42");
        assert_eq!(RawValue::Number(1.5).as_text(), "1.5");
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(RawValue::Date(d).as_text(), "2024-03-09");
    }

    #[test]
    fn test_set_text_overwrites() {
        let mut row = RawRow::from_pairs([("CODUSUR", "10")]);
        row.set_text("CODUSUR", "BALCAO_SP");
        assert_eq!(row.text("CODUSUR"), "BALCAO_SP");
        assert_eq!(row.len(), 1);
    }
}
