use std::path::PathBuf;

use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

use crate::models::Mode;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// A required column is missing from the uploaded table. Lists every missing name.
    #[error("{mode}: missing required columns: {}", .missing.join(", "))]
    Schema { mode: Mode, missing: Vec<String> },

    #[error("unsupported input format: {0}")]
    UnsupportedInputFormat(String),

    #[error("refusing to overwrite input file {}", .0.display())]
    OutputClobbersInput(PathBuf),

    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("spreadsheet writer error: {0}")]
    Spreadsheet(#[from] XlsxError),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
