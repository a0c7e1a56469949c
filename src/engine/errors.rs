use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Table {0} does not exist")]
    NoSuchTable(String),

    #[error("Invalid identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("Failed to write result row: {0}")]
    Sink(#[from] std::io::Error),
}
