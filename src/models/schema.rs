use std::fmt;
use std::str::FromStr;

/// Which record type an uploaded workbook holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Facturación
    Billing,
    /// Cartera
    Receivables,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Billing, Mode::Receivables];

    /// Display label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Billing => "Facturación",
            Mode::Receivables => "Cartera",
        }
    }

    /// ASCII name used in output file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Mode::Billing => "facturacion",
            Mode::Receivables => "cartera",
        }
    }

    pub fn schema(&self) -> &'static [ColumnSpec] {
        match self {
            Mode::Billing => BILLING_SCHEMA,
            Mode::Receivables => RECEIVABLES_SCHEMA,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_lowercase().replace('ó', "o");
        match folded.as_str() {
            "facturacion" | "billing" => Ok(Mode::Billing),
            "cartera" | "receivables" => Ok(Mode::Receivables),
            _ => Err(format!(
                "unknown mode '{}' (expected Facturación or Cartera)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// Per-column cleaning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// Stringify and remove every `-`.
    StripSeparators,
    /// Stringify and upper-case.
    Uppercase,
    /// Parse as a calendar date and render `YYYY-MM-DD`; unparseable cells become null.
    DateFormat,
    /// Split a "<mes> <año>" label into numeric `mes` and `año` columns.
    DeriveMonthYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub presence: Presence,
    pub transform: Transform,
}

impl ColumnSpec {
    const fn required(name: &'static str, transform: Transform) -> Self {
        Self {
            name,
            presence: Presence::Required,
            transform,
        }
    }

    const fn optional(name: &'static str, transform: Transform) -> Self {
        Self {
            name,
            presence: Presence::Optional,
            transform,
        }
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }
}

pub const BILLING_SCHEMA: &[ColumnSpec] = &[
    ColumnSpec::required("nfacturasiigo", Transform::StripSeparators),
    ColumnSpec::required("nui", Transform::StripSeparators),
    ColumnSpec::required("identificacion", Transform::Identity),
    ColumnSpec::required("address", Transform::Uppercase),
    ColumnSpec::required("localidad", Transform::Uppercase),
    ColumnSpec::required("cantidad", Transform::Identity),
    ColumnSpec::required("fechaemi", Transform::DateFormat),
    ColumnSpec::required("p_inicial", Transform::DateFormat),
    ColumnSpec::required("p_final", Transform::DateFormat),
    ColumnSpec::required("mes", Transform::Identity),
    ColumnSpec::required("ano", Transform::Identity),
];

pub const RECEIVABLES_SCHEMA: &[ColumnSpec] = &[
    ColumnSpec::optional("Identificación", Transform::Identity),
    ColumnSpec::optional("NUI", Transform::StripSeparators),
    ColumnSpec::optional("Factura", Transform::StripSeparators),
    ColumnSpec::optional("Centro de costo", Transform::Uppercase),
    ColumnSpec::optional("Saldo Factura", Transform::Identity),
    ColumnSpec::optional("Mes de Cobro", Transform::DeriveMonthYear),
];

/// Receivables column whose fill sentinel marks a row for removal.
pub const INVOICE_COLUMN: &str = "Factura";

/// Value written into every null cell of a receivables table.
pub const FILL_SENTINEL: &str = "NA";

pub const SOURCE_NAME_COLUMN: &str = "nombre_archivo";
pub const DERIVED_MONTH_COLUMN: &str = "mes";
pub const DERIVED_YEAR_COLUMN: &str = "año";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Facturación".parse::<Mode>().unwrap(), Mode::Billing);
        assert_eq!("facturacion".parse::<Mode>().unwrap(), Mode::Billing);
        assert_eq!("FACTURACIÓN".parse::<Mode>().unwrap(), Mode::Billing);
        assert_eq!("Cartera".parse::<Mode>().unwrap(), Mode::Receivables);
        assert_eq!("receivables".parse::<Mode>().unwrap(), Mode::Receivables);
        assert!("inicio".parse::<Mode>().is_err());
    }

    #[test]
    fn test_billing_schema_is_all_required() {
        assert_eq!(BILLING_SCHEMA.len(), 11);
        assert!(BILLING_SCHEMA.iter().all(ColumnSpec::is_required));
    }

    #[test]
    fn test_receivables_schema_is_all_optional() {
        assert_eq!(RECEIVABLES_SCHEMA.len(), 6);
        assert!(RECEIVABLES_SCHEMA.iter().all(|spec| !spec.is_required()));
        assert!(RECEIVABLES_SCHEMA.iter().any(|spec| spec.name == INVOICE_COLUMN));
    }

    #[test]
    fn test_slugs_are_ascii() {
        for mode in Mode::ALL {
            assert!(mode.slug().is_ascii());
        }
    }
}
