use polars::prelude::*;

use crate::error::CaptureResult;

/// Encodes a table as UTF-8, comma-separated text with a header row. Nulls
/// are written as empty fields.
pub fn to_delimited_bytes(df: &DataFrame) -> CaptureResult<Vec<u8>> {
    // The writer needs a mutable frame to rechunk; cloning shares the buffers.
    let mut df = df.clone();
    let mut buf = Vec::new();

    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized_sample() -> DataFrame {
        df!(
            "nombre_archivo" => &["cartera, marzo.xlsx", "cartera, marzo.xlsx"],
            "Factura" => &["INV001", "INV003"],
            "Centro de costo" => &["NORTE", "NA"],
            "Mes de Cobro" => &["enero 2023", "foo \"2023\""],
            "mes" => &[Some(1i64), None],
            "año" => &[Some(2023i64), Some(2023)]
        )
        .unwrap()
    }

    #[test]
    fn test_header_row_without_index() {
        let bytes = to_delimited_bytes(&normalized_sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let header = text.lines().next().unwrap();
        assert_eq!(header, "nombre_archivo,Factura,Centro de costo,Mes de Cobro,mes,año");
    }

    #[test]
    fn test_round_trip_through_csv_reader() {
        let df = normalized_sample();
        let bytes = to_delimited_bytes(&df).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        let expected_headers: Vec<String> =
            df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(headers, expected_headers);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), df.height());

        for (col_idx, column) in df.get_columns().iter().enumerate() {
            let text = column.cast(&DataType::String).unwrap();
            for (row_idx, value) in text.str().unwrap().into_iter().enumerate() {
                assert_eq!(&records[row_idx][col_idx], value.unwrap_or(""));
            }
        }
    }

    #[test]
    fn test_empty_table_encodes_header_only() {
        let df = df!("Factura" => Vec::<String>::new()).unwrap();
        let bytes = to_delimited_bytes(&df).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap().trim_end(), "Factura");
    }
}
