use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{CaptureError, CaptureResult};
use crate::models::{ColumnSpec, DERIVED_MONTH_COLUMN, DERIVED_YEAR_COLUMN, Mode, Transform};

pub const ISO_DATE: &str = "%Y-%m-%d";

// ISO first, then day-first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

// Last serial day a spreadsheet can hold (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

// Serial 60 is the nonexistent 1900-02-29 spreadsheets keep for Lotus
// compatibility; serials below it count from one day later.
const PHANTOM_LEAP_DAY_SERIAL: f64 = 60.0;

// chrono's `%Y` takes one or two digit years, so "05/01/24" would otherwise
// match the ISO layouts as year 5.
const MIN_DATE_YEAR: i32 = 1000;
const MAX_DATE_YEAR: i32 = 9999;

static SPANISH_MONTHS: LazyLock<HashMap<&'static str, i64>> = LazyLock::new(|| {
    HashMap::from([
        ("enero", 1),
        ("febrero", 2),
        ("marzo", 3),
        ("abril", 4),
        ("mayo", 5),
        ("junio", 6),
        ("julio", 7),
        ("agosto", 8),
        ("septiembre", 9),
        ("octubre", 10),
        ("noviembre", 11),
        ("diciembre", 12),
    ])
});

static LABEL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("label separator pattern is valid"));

/// Names of the schema columns the table actually has, in schema order.
pub fn present_columns(df: &DataFrame, schema: &[ColumnSpec]) -> Vec<&'static str> {
    schema
        .iter()
        .filter(|spec| df.column(spec.name).is_ok())
        .map(|spec| spec.name)
        .collect()
}

/// Required schema columns the table lacks.
pub fn missing_required(df: &DataFrame, schema: &[ColumnSpec]) -> Vec<String> {
    schema
        .iter()
        .filter(|spec| spec.is_required() && df.column(spec.name).is_err())
        .map(|spec| spec.name.to_string())
        .collect()
}

/// Copies the mode's schema columns out of `raw` into a new frame.
///
/// Fails before anything is copied when a required column is absent; optional
/// columns that are absent are skipped.
pub fn project(raw: &DataFrame, mode: Mode) -> CaptureResult<DataFrame> {
    let schema = mode.schema();

    let missing = missing_required(raw, schema);
    if !missing.is_empty() {
        return Err(CaptureError::Schema { mode, missing });
    }

    let present = present_columns(raw, schema);
    debug!("{}: projecting {} of {} schema columns", mode, present.len(), schema.len());

    Ok(raw.select(present)?)
}

/// Applies the per-cell transforms of every schema column present in `df`.
///
/// Month/year derivation is not a per-cell rewrite and is left to the caller.
pub fn apply_cell_transforms(df: &mut DataFrame, schema: &[ColumnSpec]) -> CaptureResult<()> {
    for spec in schema {
        if df.column(spec.name).is_err() {
            continue;
        }

        match spec.transform {
            Transform::StripSeparators => strip_separators(df, spec.name)?,
            Transform::Uppercase => uppercase(df, spec.name)?,
            Transform::DateFormat => {
                let degraded = format_dates(df, spec.name)?;
                if degraded > 0 {
                    warn!("{}: {} cells could not be read as dates", spec.name, degraded);
                }
            }
            Transform::Identity | Transform::DeriveMonthYear => {}
        }
    }

    Ok(())
}

pub fn strip_separators(df: &mut DataFrame, col_name: &str) -> CaptureResult<()> {
    map_text_column(df, col_name, |s| s.replace('-', ""))
}

pub fn uppercase(df: &mut DataFrame, col_name: &str) -> CaptureResult<()> {
    map_text_column(df, col_name, |s| s.to_uppercase())
}

// Stringifies the column and rewrites each non-null cell. Nulls stay null.
fn map_text_column<F>(df: &mut DataFrame, col_name: &str, f: F) -> CaptureResult<()>
where
    F: Fn(&str) -> String,
{
    let text = df.column(col_name)?.cast(&DataType::String)?;
    let mapped: Vec<Option<String>> = text.str()?.into_iter().map(|v| v.map(&f)).collect();

    df.with_column(Series::new(col_name.into(), mapped))?;
    Ok(())
}

/// Rewrites a column as `YYYY-MM-DD` strings and returns how many non-null
/// cells could not be parsed (they become null).
pub fn format_dates(df: &mut DataFrame, col_name: &str) -> CaptureResult<usize> {
    let column = df.column(col_name)?;
    let non_null_before = column.len() - column.null_count();

    let dates: Vec<Option<String>> = match column.dtype() {
        DataType::Int32
        | DataType::Int64
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => {
            let serials = column.cast(&DataType::Float64)?;
            serials
                .f64()?
                .into_iter()
                .map(|v| v.and_then(excel_serial_to_date).map(|d| d.format(ISO_DATE).to_string()))
                .collect()
        }
        _ => {
            let text = column.cast(&DataType::String)?;
            text.str()?
                .into_iter()
                .map(|v| v.and_then(parse_date).map(|d| d.format(ISO_DATE).to_string()))
                .collect()
        }
    };

    let non_null_after = dates.iter().filter(|d| d.is_some()).count();
    df.with_column(Series::new(col_name.into(), dates))?;

    Ok(non_null_before - non_null_after)
}

/// Parses a date cell written as ISO (`2024-01-05`) or day-first
/// (`05/01/2024`), optionally followed by a time of day.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .chain(
            DATETIME_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date()),
        )
        .find(|d| (MIN_DATE_YEAR..=MAX_DATE_YEAR).contains(&d.year()))
}

/// Spreadsheet serial day number to a date, as the 1900 date system shows it:
/// serial 1 is 1900-01-01 and serial 60 (the phantom 1900-02-29) is rejected.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }

    let day = serial.floor();
    if day == PHANTOM_LEAP_DAY_SERIAL {
        return None;
    }

    let days = if day < PHANTOM_LEAP_DAY_SERIAL { day + 1.0 } else { day };
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days as u64))
}

/// Replaces every missing cell (null, or an empty string) with `sentinel`.
/// Columns holding missing cells become string columns; the others keep
/// their type. Returns the number of cells filled.
pub fn fill_nulls(df: &mut DataFrame, sentinel: &str) -> CaptureResult<usize> {
    let with_missing: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() > 0 || has_empty_text(c))
        .map(|c| c.name().to_string())
        .collect();

    let mut filled = 0;
    for col_name in with_missing {
        let text = df.column(&col_name)?.cast(&DataType::String)?;

        let values: Vec<String> = text
            .str()?
            .into_iter()
            .map(|v| match v {
                None | Some("") => {
                    filled += 1;
                    sentinel.to_string()
                }
                Some(s) => s.to_string(),
            })
            .collect();

        df.with_column(Series::new(col_name.as_str().into(), values))?;
    }

    Ok(filled)
}

fn has_empty_text(column: &Column) -> bool {
    column.dtype() == &DataType::String
        && column
            .str()
            .map(|ca| ca.into_iter().any(|v| v == Some("")))
            .unwrap_or(false)
}

/// Stringifies the label column and appends the derived `mes` and `año` columns.
pub fn derive_month_year(df: &mut DataFrame, label_column: &str) -> CaptureResult<()> {
    let labels = df.column(label_column)?.cast(&DataType::String)?;

    let (months, years): (Vec<Option<i64>>, Vec<Option<i64>>) = labels
        .str()?
        .into_iter()
        .map(|v| parse_month_year(v.unwrap_or("")))
        .unzip();

    df.with_column(labels)?;
    df.with_column(Series::new(DERIVED_MONTH_COLUMN.into(), months))?;
    df.with_column(Series::new(DERIVED_YEAR_COLUMN.into(), years))?;

    Ok(())
}

/// Splits `"<mes> <año>"` on the first whitespace run. Returns the month
/// number (1-12) and the year; either is `None` when missing or unreadable.
pub fn parse_month_year(label: &str) -> (Option<i64>, Option<i64>) {
    let mut parts = LABEL_SEPARATOR.splitn(label.trim(), 2);
    let month_word = parts.next().unwrap_or("");
    let year_text = parts.next().unwrap_or("");

    let month = SPANISH_MONTHS.get(month_word.to_lowercase().as_str()).copied();
    (month, parse_year(year_text))
}

fn parse_year(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_DATE_YEAR as f64)
            .map(|f| f as i64)
    })
}
