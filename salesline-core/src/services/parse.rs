//! Extract parsers - delimited text and spreadsheets into raw rows

use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use encoding_rs::WINDOWS_1252;
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::row::format_number;
use crate::domain::value::{parse_date, serial_to_date};
use crate::domain::{RawRow, RawValue};

/// File layout, decided from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFormat {
    Delimited,
    Spreadsheet,
}

impl ExtractFormat {
    pub fn from_file_name(file_name: &str) -> Self {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") || lower.ends_with(".txt") {
            ExtractFormat::Delimited
        } else {
            ExtractFormat::Spreadsheet
        }
    }
}

/// Read and parse an extract from disk
///
/// An absent path is not an error: it yields no rows.
pub async fn read_extract(path: Option<&Path>) -> Result<Vec<RawRow>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::read(&file_name, e.to_string()))?;

    let rows = parse_extract(&bytes, &file_name)?;
    debug!(file = %file_name, rows = rows.len(), "parsed extract");
    Ok(rows)
}

/// Parse extract bytes; the file name selects the format and labels errors
pub fn parse_extract(bytes: &[u8], file_name: &str) -> Result<Vec<RawRow>> {
    match ExtractFormat::from_file_name(file_name) {
        ExtractFormat::Delimited => parse_delimited(bytes, file_name),
        ExtractFormat::Spreadsheet => parse_spreadsheet(bytes, file_name),
    }
}

/// Strict UTF-8, falling back to windows-1252 (the web's Latin-1)
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

fn clean_header(raw: &str) -> String {
    raw.replace('"', "")
        .trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

/// Parse delimited text
///
/// One record per non-blank line: quotes are stripped from values, never
/// interpreted, so a stray `"` cannot swallow the lines after it. The
/// delimiter is `;` when the header line has one and `,` otherwise. Empty and
/// missing trailing values become null.
pub fn parse_delimited(bytes: &[u8], file_name: &str) -> Result<Vec<RawRow>> {
    let text = decode_text(bytes);
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some(header_line) = lines.first() else {
        return Ok(Vec::new());
    };
    let delimiter = if header_line.contains(';') { b';' } else { b',' };
    let body = lines.join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quoting(false)
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::parse(file_name, e.to_string()))?
        .iter()
        .map(clean_header)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::parse(file_name, e.to_string()))?;
        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let value = match record.get(index).map(|v| v.replace('"', "")) {
                    Some(v) if !v.is_empty() => RawValue::Text(v),
                    _ => RawValue::Null,
                };
                (header.clone(), value)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Null,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Float(f) => RawValue::Text(format_number(*f)),
        Data::Int(i) => RawValue::Text(i.to_string()),
        Data::DateTime(dt) => serial_to_date(dt.as_f64())
            .map(RawValue::Date)
            .unwrap_or(RawValue::Null),
        Data::DateTimeIso(s) => parse_date(&RawValue::Text(s.clone()))
            .map(RawValue::Date)
            .unwrap_or_else(|| RawValue::Text(s.clone())),
        other => RawValue::Text(other.to_string()),
    }
}

/// Parse the first sheet of a workbook (xlsx, xls, xlsb or ods)
///
/// The first row holds the headers; columns without a header and rows without
/// any value are skipped. Date cells stay dates, everything else is text.
pub fn parse_spreadsheet(bytes: &[u8], file_name: &str) -> Result<Vec<RawRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::parse(file_name, e.to_string()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err(Error::parse(file_name, "workbook has no sheets"));
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::parse(file_name, e.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_cells) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => clean_header(&other.to_string()),
        })
        .collect();

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(cells) {
            if header.is_empty() {
                continue;
            }
            let value = cell_value(cell);
            if !value.is_null() {
                row.insert(header.clone(), value);
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}
