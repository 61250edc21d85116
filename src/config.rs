use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for rlatool.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Report key stamped on every record. Empty means the input file stem.
    #[serde(default)]
    pub key: String,

    /// Fail when the report timestamp is missing or malformed. Default: false.
    #[serde(default)]
    pub strict_timestamp: bool,

    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Rendering used when no subcommand overrides it. Default: json.
    #[serde(default)]
    pub format: OutputFormat,

    /// Omit CSV header rows so tables can be appended to. Default: false.
    #[serde(default)]
    pub skip_headers: bool,

    /// Directory for CSV files. Empty means write to stdout.
    #[serde(default)]
    pub directory: String,
}

/// Output renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Whole snapshot as one JSON document.
    Json,
    /// One CSV table per entity collection.
    Csv,
    /// Databases annotated with per-node shard tallies, as JSON.
    Databases,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Json
    }
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            key: String::new(),
            strict_timestamp: false,
            output: OutputConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            skip_headers: false,
            directory: String::new(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("invalid log_level: {other}"),
        }

        if self.key.contains(['/', '\\']) {
            bail!("key must not contain path separators: {}", self.key);
        }

        if !self.output.directory.is_empty() && self.output.format != OutputFormat::Csv {
            bail!("output.directory is only supported with output.format=csv");
        }

        Ok(())
    }

    /// Report key for an input, falling back to the input file stem.
    pub fn key_for(&self, input: &Path) -> String {
        if !self.key.is_empty() {
            return self.key.clone();
        }
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| s != "-")
            .unwrap_or_else(|| "stdin".to_string())
    }
}
