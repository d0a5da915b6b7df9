use polars::prelude::*;
use tracing::info;

use crate::error::CaptureResult;
use crate::models::{BILLING_SCHEMA, Mode};
use crate::processor::column_ops;

/// Cleans a Facturación table: keeps the 11 billing columns, strips `-` from
/// the invoice and NUI numbers, renders the three dates as `YYYY-MM-DD` and
/// upper-cases address and locality. No row is ever dropped.
pub struct BillingNormalizer;

impl BillingNormalizer {
    pub fn normalize_dataframe(&self, raw: &DataFrame) -> CaptureResult<DataFrame> {
        let mut df = column_ops::project(raw, Mode::Billing)?;
        column_ops::apply_cell_transforms(&mut df, BILLING_SCHEMA)?;

        info!(
            "Normalized {} billing rows across {} columns",
            df.height(),
            df.width()
        );
        Ok(df)
    }
}

pub fn normalize_billing(raw: &DataFrame) -> CaptureResult<DataFrame> {
    BillingNormalizer.normalize_dataframe(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;

    fn sample_billing() -> DataFrame {
        df!(
            "nfacturasiigo" => &["FE-1001", "FE-1002", "FE-1003"],
            "nui" => &[Some("12-345"), Some("67-890"), None],
            "identificacion" => &[900123i64, 800456, 700789],
            "address" => &["calle 10 # 5-20", "carrera 7", "av. boyacá"],
            "localidad" => &["chapinero", "suba", "kennedy"],
            "cantidad" => &[Some(2.5f64), Some(1.0), None],
            "fechaemi" => &[Some("2024-01-05"), Some("05/01/2024"), Some("")],
            "p_inicial" => &[Some("2023-12-01"), None, Some("31/12/2023")],
            "p_final" => &["2023-12-31", "not a date", "2024-01-31 00:00:00"],
            "mes" => &[1i64, 1, 1],
            "ano" => &[2024i64, 2024, 2024],
            "observaciones" => &["x", "y", "z"]
        )
        .unwrap()
    }

    #[test]
    fn test_output_has_exactly_the_billing_columns() {
        let df = normalize_billing(&sample_billing()).unwrap();

        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let expected: Vec<String> = BILLING_SCHEMA.iter().map(|s| s.name.to_string()).collect();
        assert_eq!(names, expected);
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_missing_any_required_column_fails() {
        let raw = sample_billing();

        for spec in BILLING_SCHEMA {
            let without = raw.drop(spec.name).unwrap();
            match normalize_billing(&without) {
                Err(CaptureError::Schema { missing, .. }) => {
                    assert_eq!(missing, vec![spec.name.to_string()]);
                }
                other => panic!("expected schema error without {}, got {:?}", spec.name, other),
            }
        }
    }

    #[test]
    fn test_ids_lose_hyphens() {
        let df = normalize_billing(&sample_billing()).unwrap();

        let facturas = df.column("nfacturasiigo").unwrap().str().unwrap();
        assert_eq!(facturas.get(0), Some("FE1001"));

        let nuis = df.column("nui").unwrap().str().unwrap();
        assert_eq!(nuis.get(0), Some("12345"));
        assert_eq!(nuis.get(2), None);
    }

    #[test]
    fn test_dates_are_iso_or_null() {
        let df = normalize_billing(&sample_billing()).unwrap();

        let fechaemi = df.column("fechaemi").unwrap().str().unwrap();
        assert_eq!(fechaemi.get(0), Some("2024-01-05"));
        assert_eq!(fechaemi.get(1), Some("2024-01-05"));
        assert_eq!(fechaemi.get(2), None);

        let p_inicial = df.column("p_inicial").unwrap().str().unwrap();
        assert_eq!(p_inicial.get(1), None);
        assert_eq!(p_inicial.get(2), Some("2023-12-31"));

        let p_final = df.column("p_final").unwrap().str().unwrap();
        assert_eq!(p_final.get(1), None);
        assert_eq!(p_final.get(2), Some("2024-01-31"));
    }

    #[test]
    fn test_text_fields_are_uppercased() {
        let df = normalize_billing(&sample_billing()).unwrap();

        let address = df.column("address").unwrap().str().unwrap();
        assert_eq!(address.get(2), Some("AV. BOYACÁ"));

        let localidad = df.column("localidad").unwrap().str().unwrap();
        assert_eq!(localidad.get(0), Some("CHAPINERO"));
    }

    #[test]
    fn test_other_columns_pass_through() {
        let df = normalize_billing(&sample_billing()).unwrap();

        assert_eq!(df.column("identificacion").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("ano").unwrap().i64().unwrap().get(0), Some(2024));

        let cantidad = df.column("cantidad").unwrap().f64().unwrap();
        assert_eq!(cantidad.get(0), Some(2.5));
        assert_eq!(cantidad.get(2), None);
    }

    #[test]
    fn test_caller_table_is_not_mutated() {
        let raw = sample_billing();
        let before = raw.clone();

        normalize_billing(&raw).unwrap();

        assert!(raw.equals_missing(&before));
        assert_eq!(raw.column("address").unwrap().str().unwrap().get(0), Some("calle 10 # 5-20"));
    }
}
