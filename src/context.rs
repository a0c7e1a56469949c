//! Per-invocation context: configuration and project description, loaded once
//! and handed to everything that needs them.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::catalog::{CatalogError, ProjectCatalog, ProjectConfig};
use crate::config::{CliOverrides, CompilerConfig, ConfigError};
use crate::engine::{EngineError, SqliteEngine};
use crate::output::FormatOptions;
use crate::query_compiler::SampleFilterSettings;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Project {0} does not name a database file")]
    NoDatabase(String),
}

#[derive(Debug, Clone)]
pub struct QueryContext {
    pub config: CompilerConfig,
    pub project: ProjectConfig,
    /// YAML file the project was read from, if any.
    pub project_file: Option<PathBuf>,
}

impl QueryContext {
    /// Load the project description and the configuration.
    ///
    /// The configuration comes from `config_file` when given, else from the
    /// environment; command line overrides are applied last.
    pub fn load(
        project_file: &Path,
        config_file: Option<&Path>,
        overrides: CliOverrides,
    ) -> Result<Self, ContextError> {
        let mut config = match config_file {
            Some(path) => CompilerConfig::from_yaml_file(path)?,
            None => CompilerConfig::from_env()?,
        };
        config.merge(overrides)?;
        let project = ProjectConfig::from_yaml_file(project_file)?;
        log::debug!("Loaded project {} with {:?}", project.name, config);
        Ok(QueryContext {
            config,
            project,
            project_file: Some(project_file.to_path_buf()),
        })
    }

    /// Open the project database and its catalog.
    pub fn open(&self) -> Result<(SqliteEngine, ProjectCatalog), ContextError> {
        let database = self
            .project
            .database
            .as_ref()
            .ok_or_else(|| ContextError::NoDatabase(self.project.name.clone()))?;
        let mut engine = SqliteEngine::open(database)?;
        let catalog = ProjectCatalog::open(&self.project, &mut engine)?;
        Ok((engine, catalog))
    }

    pub fn sample_filter_settings(&self) -> SampleFilterSettings {
        SampleFilterSettings::from(&self.config)
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions::from_config(&self.config)
    }
}
