pub mod delimited;
pub mod spreadsheet;

pub use delimited::*;
pub use spreadsheet::*;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CaptureError, CaptureResult};
use crate::models::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn encode(&self, df: &DataFrame) -> CaptureResult<Vec<u8>> {
        match self {
            ExportFormat::Xlsx => to_spreadsheet_bytes(df),
            ExportFormat::Csv => to_delimited_bytes(df),
        }
    }
}

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNaming {
    /// `facturacion_procesada.xlsx`, `cartera_procesada.csv`
    Mode,
    /// Input base name with the output extension.
    Input,
}

pub fn output_file_name(
    mode: Mode,
    naming: FileNaming,
    input_name: &str,
    format: ExportFormat,
) -> String {
    match naming {
        FileNaming::Mode => format!("{}_procesada.{}", mode.slug(), format.extension()),
        FileNaming::Input => {
            let stem = Path::new(input_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("{}_procesada", mode.slug()));
            format!("{}.{}", stem, format.extension())
        }
    }
}

#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub bytes: usize,
}

/// Encodes `df` in each format and writes the files into `out_dir`. Fails
/// without writing anything when a target would overwrite `input_path`.
pub fn write_outputs(
    df: &DataFrame,
    mode: Mode,
    input_path: &Path,
    out_dir: &Path,
    naming: FileNaming,
    formats: &[ExportFormat],
) -> CaptureResult<Vec<WrittenFile>> {
    let input_name = input_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let targets: Vec<(ExportFormat, PathBuf)> = formats
        .iter()
        .map(|format| {
            let name = output_file_name(mode, naming, &input_name, *format);
            (*format, out_dir.join(name))
        })
        .collect();

    for (_, path) in &targets {
        if same_file(path, input_path) {
            return Err(CaptureError::OutputClobbersInput(path.clone()));
        }
    }

    std::fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(targets.len());
    for (format, path) in targets {
        let bytes = format.encode(df)?;
        std::fs::write(&path, &bytes)?;
        info!(
            "Wrote {} ({}, {} bytes)",
            path.display(),
            format.mime_type(),
            bytes.len()
        );
        written.push(WrittenFile {
            path,
            format,
            bytes: bytes.len(),
        });
    }

    Ok(written)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
