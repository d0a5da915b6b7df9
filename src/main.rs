use anyhow::{Context, Result, anyhow, bail};
use export::WrittenFile;
use models::Mode;
use polars::prelude::DataFrame;
use settings::CaptureConfig;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod error;
mod export;
mod models;
mod processor;
mod reader;
mod settings;

const INSTRUCTIONS: &str = "\
📊 Captura de Datos

Uso:
  captura <facturacion|cartera> <archivo.xlsx> [--out DIR] [--per-file] [--config FILE]
  captura inspect <archivo.xlsx> [--config FILE]
  captura settings [--config FILE]

📌 Instrucciones:
  - Selecciona una opción: Facturación o Cartera.
  - Indica un archivo Excel con los datos requeridos.
  - Se generan los resultados en Excel y CSV.";

#[derive(Debug, Default)]
struct CliArgs {
    positional: Vec<String>,
    out_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    per_file: bool,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = CliArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out" | "-o" => {
                    let dir = args.next().ok_or_else(|| anyhow!("--out needs a directory"))?;
                    parsed.out_dir = Some(PathBuf::from(dir));
                }
                "--config" | "-c" => {
                    let path = args.next().ok_or_else(|| anyhow!("--config needs a file"))?;
                    parsed.config_path = Some(PathBuf::from(path));
                }
                "--per-file" => parsed.per_file = true,
                "--help" | "-h" => parsed.positional.insert(0, "inicio".to_string()),
                _ => parsed.positional.push(arg),
            }
        }

        Ok(parsed)
    }
}

fn main() -> Result<()> {
    let cli = CliArgs::parse(env::args().skip(1))?;

    let mut config = CaptureConfig::load(cli.config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = &cli.out_dir {
        config.output.dir = dir.clone();
    }
    if cli.per_file {
        config.output.naming = export::FileNaming::Input;
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let command = cli.positional.first().map(String::as_str).unwrap_or("inicio");
    match command {
        "inicio" => {
            println!("{}", INSTRUCTIONS);
            Ok(())
        }
        "settings" => {
            println!("{}", config.to_toml().context("Failed to render settings")?);
            Ok(())
        }
        "inspect" => {
            let input = input_path(&cli, 1)?;
            inspect_file(&input)?;
            Ok(())
        }
        other => {
            let mode: Mode = other.parse().map_err(|e: String| anyhow!(e))?;
            let input = input_path(&cli, 1)?;

            info!("🚀 Processing {} file {}", mode, input.display());
            match process_file(mode, &input, &config) {
                Ok(written) => {
                    println!("✅ Archivo procesado correctamente.");
                    for file in &written {
                        println!(
                            "📥 {} ({}, {} bytes)",
                            file.path.display(),
                            file.format.mime_type(),
                            file.bytes
                        );
                    }
                    Ok(())
                }
                Err(e) => {
                    error!("❌ Failed to process {}: {:#}", input.display(), e);
                    Err(e)
                }
            }
        }
    }
}

fn input_path(cli: &CliArgs, idx: usize) -> Result<PathBuf> {
    match cli.positional.get(idx) {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("Missing input file\n\n{}", INSTRUCTIONS),
    }
}

fn process_file(mode: Mode, input: &Path, config: &CaptureConfig) -> Result<Vec<WrittenFile>> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    let raw = reader::read_workbook(&bytes)
        .with_context(|| format!("Failed to read workbook: {}", input.display()))?;
    info!("Loaded raw table with {} rows and {} columns", raw.height(), raw.width());

    let source_name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let df = processor::normalize(mode, &raw, &source_name)
        .with_context(|| format!("Failed to normalize {} data", mode))?;

    if config.output.preview_rows > 0 {
        println!("{}", df.head(Some(config.output.preview_rows)));
    }

    let written = export::write_outputs(
        &df,
        mode,
        input,
        &config.output.dir,
        config.output.naming,
        &config.export_formats(),
    )
    .context("Failed to write output files")?;

    Ok(written)
}

#[derive(Debug, PartialEq)]
struct SchemaCoverage {
    present: Vec<&'static str>,
    missing_required: Vec<String>,
    missing_optional: Vec<&'static str>,
}

fn schema_coverage(raw: &DataFrame, mode: Mode) -> SchemaCoverage {
    let schema = mode.schema();
    let present = processor::column_ops::present_columns(raw, schema);
    let missing_optional = schema
        .iter()
        .filter(|spec| !spec.is_required() && !present.contains(&spec.name))
        .map(|spec| spec.name)
        .collect();

    SchemaCoverage {
        missing_required: processor::column_ops::missing_required(raw, schema),
        missing_optional,
        present,
    }
}

fn inspect_file(input: &Path) -> Result<Vec<(Mode, SchemaCoverage)>> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    let raw = reader::read_workbook(&bytes)
        .with_context(|| format!("Failed to read workbook: {}", input.display()))?;

    println!("=== {} ({} rows) ===", input.display(), raw.height());
    for column in raw.get_columns() {
        println!("   {}: {:?} ({} empty)", column.name(), column.dtype(), column.null_count());
    }

    let mut report = Vec::with_capacity(Mode::ALL.len());
    for mode in Mode::ALL {
        let schema = mode.schema();
        let coverage = schema_coverage(&raw, mode);

        println!("\n{}: {} of {} columns present", mode, coverage.present.len(), schema.len());
        for spec in schema {
            let marker = if coverage.present.contains(&spec.name) {
                "✅"
            } else if spec.is_required() {
                "❌"
            } else {
                "⚠️"
            };
            println!("   {} {}", marker, spec.name);
        }
        if !coverage.missing_required.is_empty() {
            println!("   Missing required: {}", coverage.missing_required.join(", "));
        }

        report.push((mode, coverage));
    }

    Ok(report)
}
