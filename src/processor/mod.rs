pub mod billing_normalizer;
pub mod column_ops;
pub mod receivables_normalizer;

pub use billing_normalizer::*;
pub use receivables_normalizer::*;

use polars::prelude::DataFrame;

use crate::error::CaptureResult;
use crate::models::Mode;

/// Runs the normalizer matching `mode`. `source_name` is only recorded by the
/// receivables path.
pub fn normalize(mode: Mode, raw: &DataFrame, source_name: &str) -> CaptureResult<DataFrame> {
    match mode {
        Mode::Billing => normalize_billing(raw),
        Mode::Receivables => normalize_receivables(raw, source_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use polars::prelude::*;

    #[test]
    fn test_dispatch_by_mode() {
        let raw = df!("Factura" => &["F-1"]).unwrap();

        let receivables = normalize(Mode::Receivables, &raw, "f.xlsx").unwrap();
        assert!(receivables.column("nombre_archivo").is_ok());

        match normalize(Mode::Billing, &raw, "f.xlsx") {
            Err(CaptureError::Schema { mode, .. }) => assert_eq!(mode, Mode::Billing),
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}
