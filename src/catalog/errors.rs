//! # Catalog Error Types
//!
//! Errors raised while loading a project description, discovering variant
//! tables, building join paths or evaluating sample predicates.

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read project file: {error}")]
    ConfigReadError { error: String },

    #[error("Failed to parse project file: {error}")]
    ConfigParseError { error: String },

    #[error("Invalid project configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Master variant table `variant` does not exist in the project database")]
    MissingMasterTable,

    #[error("Unknown table or annotation source `{0}`")]
    UnknownTable(String),

    #[error("Annotation source `{source_name}` cannot be linked: {reason}")]
    UnlinkableSource { source_name: String, reason: String },

    #[error("Circular link definition involving annotation source `{0}`")]
    CyclicLink(String),

    #[error("Failed to select samples by condition `{predicate}`")]
    SampleQuery {
        predicate: String,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CatalogError {
    /// Create an InvalidConfig error naming the offending annotation source
    pub fn source_config_error(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::InvalidConfig {
            message: format!("annotation source `{}`: {}", source_name.into(), message.into()),
        }
    }
}
