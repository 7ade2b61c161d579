//! Spreadsheet readers: file path -> ordered rows of header -> cell.

use super::normalize::RawRow;
use crate::{Error, Result};
use calamine::{Data, Reader as _};
use serde_json::{Number, Value as JsonValue};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A data row and its 1-based position in the file, header excluded.
pub type NumberedRow = (usize, RawRow);

/// Reads a spreadsheet file into rows.
///
/// Implementations return at most `max_rows` rows and fail with a validation
/// error when the file holds more. Rows whose cells are all empty are skipped,
/// but still count towards the position of the rows after them.
pub trait SpreadsheetReader: Send + Sync {
    fn read(&self, path: &Path, max_rows: usize) -> Result<Vec<NumberedRow>>;
}

/// Pick a reader from the file extension (case-insensitive).
pub fn reader_for_path(path: &Path) -> Result<Box<dyn SpreadsheetReader>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => Ok(Box::new(CsvReader)),
        "json" => Ok(Box::new(JsonReader)),
        "xlsx" | "xlsm" | "xls" | "ods" => Ok(Box::new(WorkbookReader)),
        other => Err(Error::Validation(format!(
            "Unsupported file type '{other}': expected .xlsx, .xls, .csv or .json"
        ))),
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| Error::Internal(format!("Failed to open {}: {e}", path.display())))
}

fn too_many_rows(max_rows: usize) -> Error {
    Error::Validation(format!("File exceeds the maximum of {max_rows} rows"))
}

fn is_blank(row: &RawRow) -> bool {
    row.values().all(|v| match v {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

/// Collects non-blank rows up to the row limit.
struct Rows {
    rows: Vec<NumberedRow>,
    max_rows: usize,
}

impl Rows {
    fn new(max_rows: usize) -> Self {
        Self {
            rows: Vec::new(),
            max_rows,
        }
    }

    fn push(&mut self, position: usize, row: RawRow) -> Result<()> {
        if is_blank(&row) {
            return Ok(());
        }
        if self.rows.len() == self.max_rows {
            return Err(too_many_rows(self.max_rows));
        }
        self.rows.push((position, row));
        Ok(())
    }
}

/// Build a row from a header list, keeping the first column of a duplicated header.
fn zip_row(headers: &[String], mut cell: impl FnMut(usize) -> JsonValue) -> RawRow {
    let mut row = RawRow::new();
    for (idx, header) in headers.iter().enumerate() {
        if header.trim().is_empty() {
            continue;
        }
        let value = cell(idx);
        row.entry(header.clone()).or_insert(value);
    }
    row
}

/// CSV with a header row. Cells are kept as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReader;

impl CsvReader {
    fn cell(raw: &str) -> JsonValue {
        let raw = raw.trim();
        if raw.is_empty() {
            JsonValue::Null
        } else {
            JsonValue::String(raw.to_string())
        }
    }

    /// Empty lines between byte offset `from` and the next record. The parser
    /// drops them, but they still occupy rows of the file.
    fn skipped_lines(input: &[u8], from: usize) -> usize {
        let rest = input.get(from..).unwrap_or_default();
        let len = rest.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
        let mut run = &rest[..len];
        // A record cut at `\r` leaves the `\n` of its CRLF behind.
        if from > 0 && input.get(from - 1) == Some(&b'\r') && run.first() == Some(&b'\n') {
            run = &run[1..];
        }
        run.iter()
            .enumerate()
            .filter(|(i, b)| **b == b'\n' || run.get(i + 1) != Some(&b'\n'))
            .count()
    }

    pub fn read_from(&self, input: &[u8], max_rows: usize) -> Result<Vec<NumberedRow>> {
        let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::Validation(format!("Invalid CSV header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Rows::new(max_rows);
        let mut record = csv::StringRecord::new();
        let mut offset = reader.position().byte() as usize;
        let mut position = 0usize;

        while reader
            .read_record(&mut record)
            .map_err(|e| Error::Validation(format!("Invalid CSV: {e}")))?
        {
            position += 1 + Self::skipped_lines(input, offset);
            offset = reader.position().byte() as usize;

            let row = zip_row(&headers, |idx| {
                record.get(idx).map(Self::cell).unwrap_or(JsonValue::Null)
            });
            rows.push(position, row)?;
        }
        Ok(rows.rows)
    }
}

impl SpreadsheetReader for CsvReader {
    fn read(&self, path: &Path, max_rows: usize) -> Result<Vec<NumberedRow>> {
        let input = std::fs::read(path)
            .map_err(|e| Error::Internal(format!("Failed to open {}: {e}", path.display())))?;
        self.read_from(&input, max_rows)
    }
}

/// JSON array of objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl JsonReader {
    pub fn read_from<R: std::io::Read>(
        &self,
        input: R,
        max_rows: usize,
    ) -> Result<Vec<NumberedRow>> {
        let value: JsonValue = serde_json::from_reader(input)
            .map_err(|e| Error::Validation(format!("Invalid JSON: {e}")))?;
        let JsonValue::Array(items) = value else {
            return Err(Error::Validation(
                "JSON import must be an array of objects".to_string(),
            ));
        };

        let mut rows = Rows::new(max_rows);
        for (idx, item) in items.into_iter().enumerate() {
            let JsonValue::Object(row) = item else {
                return Err(Error::Validation(format!(
                    "JSON import row {} is not an object",
                    idx + 1
                )));
            };
            rows.push(idx + 1, row)?;
        }
        Ok(rows.rows)
    }
}

impl SpreadsheetReader for JsonReader {
    fn read(&self, path: &Path, max_rows: usize) -> Result<Vec<NumberedRow>> {
        self.read_from(BufReader::new(open(path)?), max_rows)
    }
}

/// Excel and OpenDocument workbooks. Only the first worksheet is read; its
/// first used row is the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookReader;

impl WorkbookReader {
    /// Text stays text and numbers stay numbers, as the workbook typed them.
    fn cell(data: &Data) -> JsonValue {
        match data {
            Data::Empty | Data::Error(_) => JsonValue::Null,
            Data::Int(i) => JsonValue::Number((*i).into()),
            Data::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Data::Bool(b) => JsonValue::Bool(*b),
            Data::DateTime(dt) => Number::from_f64(dt.as_f64())
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            other => CsvReader::cell(&other.to_string()),
        }
    }

    fn header(data: &Data) -> String {
        match data {
            Data::Empty | Data::Error(_) => String::new(),
            other => other.to_string().trim_start_matches('\u{feff}').to_string(),
        }
    }
}

impl SpreadsheetReader for WorkbookReader {
    fn read(&self, path: &Path, max_rows: usize) -> Result<Vec<NumberedRow>> {
        let mut workbook = calamine::open_workbook_auto(path)
            .map_err(|e| Error::Validation(format!("Invalid workbook: {e}")))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Validation("Workbook has no worksheets".to_string()))?
            .map_err(|e| Error::Validation(format!("Invalid worksheet: {e}")))?;

        let mut sheet = range.rows();
        let Some(header_row) = sheet.next() else {
            return Ok(Vec::new());
        };
        let headers: Vec<String> = header_row.iter().map(Self::header).collect();

        let mut rows = Rows::new(max_rows);
        // The range is dense, so empty rows inside it keep their place.
        for (idx, cells) in sheet.enumerate() {
            let row = zip_row(&headers, |col| {
                cells.get(col).map(Self::cell).unwrap_or(JsonValue::Null)
            });
            rows.push(idx + 1, row)?;
        }
        Ok(rows.rows)
    }
}
