use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Tuning knobs of the query compiler and the output formatter
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Sample sets smaller than this are inlined as one UNION subquery
    #[validate(range(
        min = 1,
        max = 500,
        message = "Inline threshold must be between 1 and 500"
    ))]
    pub inline_threshold: usize,

    /// Genotype tables scanned per INSERT when collecting variants into a temporary table.
    /// Bounded by SQLite's limit on compound SELECT terms.
    #[validate(range(min = 1, max = 500, message = "Batch size must be between 1 and 500"))]
    pub batch_size: usize,

    /// Placeholder printed for NULL values
    pub na: String,

    /// Rows buffered to compute column widths of fixed-width output
    #[validate(range(min = 1, message = "Pretty cache must hold at least one row"))]
    pub pretty_cache_rows: usize,

    /// Whether to draw a progress bar while scanning genotype tables
    pub show_progress: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 50,
            batch_size: 64,
            na: ".".to_string(),
            pretty_cache_rows: 100,
            show_progress: true,
        }
    }
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            inline_threshold: parse_env_var("VTQ_INLINE_THRESHOLD", "50")?,
            batch_size: parse_env_var("VTQ_BATCH_SIZE", "64")?,
            na: env::var("VTQ_NA").unwrap_or_else(|_| ".".to_string()),
            pretty_cache_rows: parse_env_var("VTQ_PRETTY_CACHE_ROWS", "100")?,
            show_progress: parse_env_var("VTQ_SHOW_PROGRESS", "true")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file. Missing keys take their defaults.
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides on top of this configuration
    pub fn merge(&mut self, cli: CliOverrides) -> Result<(), ConfigError> {
        if let Some(v) = cli.inline_threshold {
            self.inline_threshold = v;
        }
        if let Some(v) = cli.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = cli.na {
            self.na = v;
        }
        if cli.no_progress {
            self.show_progress = false;
        }
        self.validate()?;
        Ok(())
    }
}

/// Settings given on the command line; `None` keeps the configured value
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub inline_threshold: Option<usize>,
    pub batch_size: Option<usize>,
    pub na: Option<String>,
    pub no_progress: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
