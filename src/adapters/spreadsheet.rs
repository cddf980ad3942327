use crate::domain::model::Record;
use crate::domain::services::cell_text;
use crate::utils::error::{RelayError, Result};
use calamine::{Data, Range, Reader, Xlsx};
use chrono::Timelike;
use serde_json::Value;
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".xlsx") {
            Some(SheetFormat::Xlsx)
        } else if lower.ends_with(".csv") {
            Some(SheetFormat::Csv)
        } else {
            None
        }
    }
}

/// Header row plus data rows of the first worksheet.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

pub fn parse_sheet(bytes: &[u8], format: SheetFormat) -> Result<Table> {
    match format {
        SheetFormat::Xlsx => parse_xlsx(bytes),
        SheetFormat::Csv => parse_csv(bytes),
    }
}

pub fn parse_xlsx(bytes: &[u8]) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(table_from_range(&range?)),
        None => Err(RelayError::processing("workbook contains no worksheets")),
    }
}

pub fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header_names(header.iter().map(cell_to_json)),
        None => return Table::default(),
    };

    let records = rows
        .map(|row| row.iter().map(cell_to_json).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|c| !c.is_null()))
        .enumerate()
        .map(|(i, cells)| build_record(i + 1, &columns, cells))
        .collect();

    Table { columns, records }
}

pub fn parse_csv(bytes: &[u8]) -> Result<Table> {
    // Excel with a Dutch locale exports `;`-separated files.
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = if first_line.contains(&b';') && !first_line.contains(&b',') {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let columns = header_names(
        reader
            .headers()?
            .iter()
            .map(|h| Value::String(h.trim_start_matches('\u{feff}').to_string())),
    );

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cells: Vec<Value> = row
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    Value::Null
                } else {
                    Value::String(v.to_string())
                }
            })
            .collect();
        if cells.iter().all(Value::is_null) {
            continue;
        }
        records.push(build_record(records.len() + 1, &columns, cells));
    }

    Ok(Table { columns, records })
}

fn header_names(cells: impl Iterator<Item = Value>) -> Vec<String> {
    cells
        .enumerate()
        .map(|(i, cell)| {
            let name = cell_text(&cell);
            if name.is_empty() {
                format!("Column{}", i + 1)
            } else {
                name
            }
        })
        .collect()
}

fn build_record(index: usize, columns: &[String], cells: Vec<Value>) -> Record {
    let mut record = Record::new(index);
    for (column, cell) in columns.iter().zip(cells) {
        record.data.insert(column.clone(), cell);
    }
    record
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => {
            // Serial values below one day are times of day (a "Tijdvak" start, say).
            let time_only = dt.as_f64() < 1.0;
            match dt.as_datetime() {
                Some(naive) if time_only => Value::String(naive.format("%H:%M").to_string()),
                Some(naive) if naive.time().num_seconds_from_midnight() == 0 => {
                    Value::String(naive.format("%Y-%m-%d").to_string())
                }
                Some(naive) => Value::String(naive.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => Value::Null,
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}
