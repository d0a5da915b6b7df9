use ::config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CaptureError, CaptureResult};
use crate::export::{ExportFormat, FileNaming};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "captura.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub formats: Vec<ExportFormat>,
    pub naming: FileNaming,
    /// Rows of the cleaned table shown after processing.
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl CaptureConfig {
    /// Layers an optional TOML file over the built-in defaults. An explicit
    /// `path` must exist; otherwise `captura.toml` is used when present.
    pub fn load(path: Option<&Path>) -> CaptureResult<Self> {
        let source = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings = Config::builder()
            .set_default("output.dir", ".")?
            .set_default("output.formats", vec!["xlsx", "csv"])?
            .set_default("output.naming", "mode")?
            .set_default("output.preview_rows", 10i64)?
            .set_default("logging.level", "info")?
            .add_source(source)
            .build()?;

        let config: CaptureConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.output.formats.is_empty() {
            return Err(CaptureError::Config(::config::ConfigError::Message(
                "output.formats cannot be empty".to_string(),
            )));
        }

        if self.logging.level.trim().is_empty() {
            return Err(CaptureError::Config(::config::ConfigError::Message(
                "logging.level cannot be empty".to_string(),
            )));
        }

        Ok(())
    }

    /// Formats to write, in configured order, without repeats.
    pub fn export_formats(&self) -> Vec<ExportFormat> {
        let mut formats = Vec::with_capacity(self.output.formats.len());
        for format in &self.output.formats {
            if !formats.contains(format) {
                formats.push(*format);
            }
        }
        formats
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output: OutputSettings {
                dir: PathBuf::from("."),
                formats: vec![ExportFormat::Xlsx, ExportFormat::Csv],
                naming: FileNaming::Mode,
                preview_rows: 10,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
