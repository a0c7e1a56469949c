use thiserror::Error;

use crate::catalog::CatalogError;
use crate::engine::EngineError;

/// Field token resolution failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("Field `{field}` is ambiguous: it is defined in {}. Please qualify it with a source name.", candidates.join(", "))]
    Ambiguous {
        field: String,
        candidates: Vec<String>,
    },

    #[error("Field `{field}` is not defined in any variant table or annotation source")]
    Undefined { field: String },

    #[error("Aggregate expressions are not allowed here: `{expression}`")]
    AggregateNotAllowed { expression: String },
}

/// Everything that can go wrong while compiling or executing a request.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A referenced table or source does not exist.
    #[error("{0}")]
    Definition(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The engine rejected a compiled statement. The raw engine message rarely
    /// pinpoints the offending token, so it is kept as the source only.
    #[error("Failed to execute query. One or more fields might be misspecified.")]
    Execution {
        #[source]
        source: EngineError,
    },

    #[error("{0}")]
    Constraint(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Bookkeeping statement failures (backup, table creation, cleanup).
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl QueryError {
    pub fn missing_table(name: &str) -> Self {
        QueryError::Definition(format!("Variant table {} does not exist.", name))
    }

    /// Wrap an engine failure on a compiled statement, logging the raw message.
    pub fn execution(sql: &str, source: EngineError) -> Self {
        log::debug!("Statement rejected by engine: {}\n  query: {}", source, sql);
        QueryError::Execution { source }
    }
}
