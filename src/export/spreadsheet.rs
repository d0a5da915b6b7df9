use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::warn;

use crate::error::CaptureResult;

pub const SHEET_NAME: &str = "Sheet1";

/// Longest text a single xlsx cell can hold.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Encodes a table as a single-sheet xlsx workbook: bold header row, no index
/// column, numbers as numbers and nulls as blank cells.
pub fn to_spreadsheet_bytes(df: &DataFrame) -> CaptureResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();

    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let col_idx = col_idx as u16;
        worksheet.write_string_with_format(0, col_idx, column.name().as_str(), &header_format)?;
        write_column(worksheet, col_idx, column)?;
    }

    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn write_column(worksheet: &mut Worksheet, col_idx: u16, column: &Column) -> CaptureResult<()> {
    match column.dtype() {
        DataType::Int64 => {
            for (row_idx, value) in column.i64()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_number(data_row(row_idx), col_idx, v as f64)?;
                }
            }
        }
        DataType::Float64 => {
            for (row_idx, value) in column.f64()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_number(data_row(row_idx), col_idx, v)?;
                }
            }
        }
        DataType::Boolean => {
            for (row_idx, value) in column.bool()?.into_iter().enumerate() {
                if let Some(v) = value {
                    worksheet.write_boolean(data_row(row_idx), col_idx, v)?;
                }
            }
        }
        _ => {
            let text = column.cast(&DataType::String)?;
            let mut truncated = 0;
            for (row_idx, value) in text.str()?.into_iter().enumerate() {
                if let Some(v) = value {
                    let v = match v.char_indices().nth(MAX_CELL_CHARS) {
                        Some((cut, _)) => {
                            truncated += 1;
                            &v[..cut]
                        }
                        None => v,
                    };
                    worksheet.write_string(data_row(row_idx), col_idx, v)?;
                }
            }
            if truncated > 0 {
                warn!(
                    "{}: {} cells cut to {} characters to fit the spreadsheet",
                    column.name(),
                    truncated,
                    MAX_CELL_CHARS
                );
            }
        }
    }

    Ok(())
}

// Row 0 is the header.
fn data_row(row_idx: usize) -> u32 {
    row_idx as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_workbook;

    #[test]
    fn test_spreadsheet_is_a_zip_container() {
        let df = df!("a" => &["x"]).unwrap();
        let bytes = to_spreadsheet_bytes(&df).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn test_spreadsheet_reads_back() {
        let df = df!(
            "nombre_archivo" => &["cartera.xlsx", "cartera.xlsx"],
            "Factura" => &["INV001", "INV003"],
            "Saldo Factura" => &[Some(150000.5f64), None],
            "mes" => &[Some(1i64), None],
            "fechaemi" => &[Some("2024-01-05"), None]
        )
        .unwrap();

        let bytes = to_spreadsheet_bytes(&df).unwrap();
        let back = read_workbook(&bytes).unwrap();

        let names: Vec<String> = back.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["nombre_archivo", "Factura", "Saldo Factura", "mes", "fechaemi"]);
        assert_eq!(back.height(), 2);

        assert_eq!(back.column("Factura").unwrap().str().unwrap().get(1), Some("INV003"));
        assert_eq!(back.column("Saldo Factura").unwrap().f64().unwrap().get(0), Some(150000.5));
        assert_eq!(back.column("Saldo Factura").unwrap().f64().unwrap().get(1), None);
        assert_eq!(back.column("mes").unwrap().i64().unwrap().get(0), Some(1));
        assert_eq!(back.column("fechaemi").unwrap().str().unwrap().get(0), Some("2024-01-05"));
    }

    #[test]
    fn test_oversized_text_is_cut_to_cell_limit() {
        let long = "ß".repeat(MAX_CELL_CHARS + 7233);
        let df = df!("address" => &[long.as_str(), "CALLE 1"]).unwrap();

        let bytes = to_spreadsheet_bytes(&df).unwrap();
        let back = read_workbook(&bytes).unwrap();

        let address = back.column("address").unwrap().str().unwrap();
        assert_eq!(address.get(0).unwrap().chars().count(), MAX_CELL_CHARS);
        assert_eq!(address.get(1), Some("CALLE 1"));
    }

    #[test]
    fn test_empty_table_still_encodes() {
        let df = DataFrame::empty();
        let bytes = to_spreadsheet_bytes(&df).unwrap();
        assert!(bytes.len() > 100);
    }
}
