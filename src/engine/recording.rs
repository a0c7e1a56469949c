use std::path::Path;

use super::{Engine, EngineError, RowVisitor};

/// Engine wrapper that records the text of every statement and query it forwards.
///
/// Bookkeeping calls (`has_table`, `column_names`, ...) are forwarded without
/// being recorded; only SQL issued through `execute`/`for_each_row` shows up.
pub struct RecordingEngine<E: Engine> {
    inner: E,
    statements: Vec<String>,
}

impl<E: Engine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        RecordingEngine {
            inner,
            statements: Vec::new(),
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Number of recorded statements whose text contains `needle` (case-insensitive).
    pub fn count_containing(&self, needle: &str) -> usize {
        let needle = needle.to_lowercase();
        self.statements
            .iter()
            .filter(|s| s.to_lowercase().contains(&needle))
            .count()
    }

    pub fn clear(&mut self) {
        self.statements.clear();
    }
}

impl<E: Engine> Engine for RecordingEngine<E> {
    fn execute(&mut self, sql: &str) -> Result<usize, EngineError> {
        self.statements.push(sql.to_string());
        self.inner.execute(sql)
    }

    fn for_each_row(&mut self, sql: &str, visit: &mut RowVisitor<'_>) -> Result<u64, EngineError> {
        self.statements.push(sql.to_string());
        self.inner.for_each_row(sql, visit)
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.inner.commit()
    }

    fn has_table(&mut self, name: &str) -> Result<bool, EngineError> {
        self.inner.has_table(name)
    }

    fn num_of_rows(&mut self, table: &str) -> Result<u64, EngineError> {
        self.inner.num_of_rows(table)
    }

    fn backup_table(&mut self, name: &str) -> Result<String, EngineError> {
        self.inner.backup_table(name)
    }

    fn attach(&mut self, path: &Path, name: &str) -> Result<(), EngineError> {
        self.inner.attach(path, name)
    }

    fn is_attached(&mut self, name: &str) -> Result<bool, EngineError> {
        self.inner.is_attached(name)
    }

    fn table_names(&mut self) -> Result<Vec<String>, EngineError> {
        self.inner.table_names()
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>, EngineError> {
        self.inner.column_names(table)
    }

    fn describe_table(&mut self, table: &str, description: &str) -> Result<(), EngineError> {
        self.inner.describe_table(table, description)
    }
}
