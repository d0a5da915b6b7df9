use polars::prelude::*;
use tracing::{debug, info};

use crate::error::CaptureResult;
use crate::models::{
    FILL_SENTINEL, INVOICE_COLUMN, Mode, RECEIVABLES_SCHEMA, SOURCE_NAME_COLUMN, Transform,
};
use crate::processor::column_ops;

pub struct ReceivablesNormalizer;

impl ReceivablesNormalizer {
    /// Cleans a Cartera table using whichever receivables columns are present.
    ///
    /// Order matters: per-cell rewrites, then the `"NA"` fill, then the invoice
    /// filter on that sentinel, then the month/year split. An invoice whose
    /// actual value is `"NA"` is dropped along with the missing ones.
    pub fn normalize_dataframe(&self, raw: &DataFrame, source_name: &str) -> CaptureResult<DataFrame> {
        let mut df = column_ops::project(raw, Mode::Receivables)?;

        column_ops::apply_cell_transforms(&mut df, RECEIVABLES_SCHEMA)?;

        let filled = column_ops::fill_nulls(&mut df, FILL_SENTINEL)?;
        debug!("Filled {} empty cells with {:?}", filled, FILL_SENTINEL);

        if df.column(INVOICE_COLUMN).is_ok() {
            let before = df.height();
            df = df
                .lazy()
                .filter(col(INVOICE_COLUMN).neq(lit(FILL_SENTINEL)))
                .collect()?;
            info!("Dropped {} rows without an invoice number", before - df.height());
        }

        for spec in RECEIVABLES_SCHEMA {
            if spec.transform == Transform::DeriveMonthYear && df.column(spec.name).is_ok() {
                column_ops::derive_month_year(&mut df, spec.name)?;
            }
        }

        let df = self.prepend_source_name(df, raw.height(), source_name)?;

        info!(
            "Normalized {} receivables rows from {} across {} columns",
            df.height(),
            source_name,
            df.width()
        );
        Ok(df)
    }

    // With no schema column present the projection has no rows either, so the
    // height comes from the uploaded table.
    fn prepend_source_name(
        &self,
        mut df: DataFrame,
        raw_height: usize,
        source_name: &str,
    ) -> CaptureResult<DataFrame> {
        let height = if df.width() == 0 { raw_height } else { df.height() };
        let names = Series::new(SOURCE_NAME_COLUMN.into(), vec![source_name; height]);

        if df.width() == 0 {
            return Ok(DataFrame::new(vec![names.into()])?);
        }

        df.insert_column(0, names)?;
        Ok(df)
    }
}

pub fn normalize_receivables(raw: &DataFrame, source_name: &str) -> CaptureResult<DataFrame> {
    ReceivablesNormalizer.normalize_dataframe(raw, source_name)
}
