use calamine::{Data, Reader, open_workbook_auto_from_rs};
use polars::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, info};

use crate::error::{CaptureError, CaptureResult};

const DATETIME_TEXT: &str = "%Y-%m-%d %H:%M:%S";

// Integers above this lose precision as f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => Cell::Int(*f as i64),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(parsed) => Cell::Text(parsed.format(DATETIME_TEXT).to_string()),
                None => Cell::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }

    fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// Reads the first sheet of an uploaded workbook (xlsx, xlsm, xlsb, xls or
/// ods) into a frame. The first row holds the column names.
pub fn read_workbook(bytes: &[u8]) -> CaptureResult<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| CaptureError::UnsupportedInputFormat(e.to_string()))?;

    let sheet_name = workbook.sheet_names().first().cloned().unwrap_or_default();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CaptureError::UnsupportedInputFormat("workbook has no sheets".to_string()))?
        .map_err(|e| CaptureError::UnsupportedInputFormat(e.to_string()))?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(header) => header,
        None => {
            info!("Sheet '{}' is empty", sheet_name);
            return Ok(DataFrame::empty());
        }
    };

    let names = header_names(header);
    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (idx, data) in row.iter().enumerate().take(names.len()) {
            cells[idx].push(Cell::from_data(data));
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .zip(cells)
        .map(|(name, column_cells)| build_series(name, column_cells).into())
        .collect();

    let df = DataFrame::new(columns)?;
    info!(
        "Read sheet '{}': {} rows, {} columns",
        sheet_name,
        df.height(),
        df.width()
    );
    Ok(df)
}

// Blank headers become "Unnamed: <idx>", repeats get ".1", ".2", ...
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    header
        .iter()
        .enumerate()
        .map(|(idx, data)| {
            let base = Cell::from_data(data)
                .to_text()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| format!("Unnamed: {}", idx));

            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

fn build_series(name: &str, cells: Vec<Cell>) -> Series {
    let filled: Vec<&Cell> = cells.iter().filter(|c| **c != Cell::Empty).collect();

    let all_int = !filled.is_empty() && filled.iter().all(|c| matches!(c, Cell::Int(_)));
    let all_numeric =
        !filled.is_empty() && filled.iter().all(|c| matches!(c, Cell::Int(_) | Cell::Float(_)));
    let all_bool = !filled.is_empty() && filled.iter().all(|c| matches!(c, Cell::Bool(_)));

    if all_int {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Cell::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else if all_numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Cell::Int(i) => Some(*i as f64),
                Cell::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else if all_bool {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                Cell::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else {
        debug!("Column '{}' read as text", name);
        let values: Vec<Option<String>> = cells.iter().map(Cell::to_text).collect();
        Series::new(name.into(), values)
    }
}
