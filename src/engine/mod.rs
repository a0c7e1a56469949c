//! Relational store abstraction
//!
//! The query compiler never talks to a database driver directly. Everything it
//! needs from the store goes through the [`Engine`] trait: run a statement,
//! iterate a cursor, and a handful of table bookkeeping calls.
//!
//! - [`SqliteEngine`]: the production backend (one connection, secondary
//!   databases attached under their own schema names)
//! - [`RecordingEngine`]: wraps any engine and records every statement it
//!   receives; used to observe which tables a compiled operation touches

pub mod errors;
mod recording;
mod sqlite;

use std::fmt;
use std::path::Path;

pub use errors::EngineError;
pub use recording::RecordingEngine;
pub use sqlite::SqliteEngine;

/// Table holding free-text descriptions of derived variant tables.
pub const TABLE_INFO_TABLE: &str = "project_table_info";

/// A single column value read from a result cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Callback invoked once per result row by [`Engine::for_each_row`].
pub type RowVisitor<'a> = dyn FnMut(&[Value]) -> Result<(), EngineError> + 'a;

/// Cursor-style access to the relational store.
///
/// All methods take `&mut self`: one invocation owns one connection and
/// statements are issued strictly one after another.
pub trait Engine {
    /// Execute a statement that returns no rows. Returns the number of rows changed.
    fn execute(&mut self, sql: &str) -> Result<usize, EngineError>;

    /// Run a query and hand every row to `visit`, in cursor order.
    /// Returns the number of rows visited.
    fn for_each_row(&mut self, sql: &str, visit: &mut RowVisitor<'_>) -> Result<u64, EngineError>;

    /// First column of the first row, or `Value::Null` if the query returns nothing.
    fn query_scalar(&mut self, sql: &str) -> Result<Value, EngineError> {
        let mut first = None;
        self.for_each_row(sql, &mut |row| {
            if first.is_none() {
                first = Some(row.first().cloned().unwrap_or(Value::Null));
            }
            Ok(())
        })?;
        Ok(first.unwrap_or(Value::Null))
    }

    fn commit(&mut self) -> Result<(), EngineError>;

    /// Whether `name` (optionally `schema.table`) exists. Case-insensitive.
    fn has_table(&mut self, name: &str) -> Result<bool, EngineError>;

    fn num_of_rows(&mut self, table: &str) -> Result<u64, EngineError> {
        if !self.has_table(table)? {
            return Err(EngineError::NoSuchTable(table.to_string()));
        }
        let count = self.query_scalar(&format!("SELECT COUNT(*) FROM {};", table))?;
        Ok(count.as_i64().unwrap_or(0).max(0) as u64)
    }

    /// Rename an existing table out of the way and return its new name.
    /// The new name is deterministic, see [`backup_name`].
    fn backup_table(&mut self, name: &str) -> Result<String, EngineError>;

    /// Attach a secondary database file under schema `name`.
    fn attach(&mut self, path: &Path, name: &str) -> Result<(), EngineError>;

    fn is_attached(&mut self, name: &str) -> Result<bool, EngineError>;

    /// Tables of the main schema, sorted by name.
    fn table_names(&mut self) -> Result<Vec<String>, EngineError>;

    /// Column names of `table` (optionally `schema.table`) in declaration order.
    fn column_names(&mut self, table: &str) -> Result<Vec<String>, EngineError>;

    /// Record a free-text description for a derived table.
    fn describe_table(&mut self, table: &str, description: &str) -> Result<(), EngineError>;
}

/// First free backup name for `name`: `_<name>_backup`, then `_<name>_backup_1`, ...
pub fn backup_name<F>(name: &str, mut taken: F) -> Result<String, EngineError>
where
    F: FnMut(&str) -> Result<bool, EngineError>,
{
    let base = format!("_{}_backup", name);
    if !taken(&base)? {
        return Ok(base);
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{}_{}", base, counter);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Split `schema.table` into its parts. Unqualified names have no schema.
pub(crate) fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

/// Plain SQL identifier check used before splicing names into statements
/// that cannot take bound parameters (PRAGMA, ATTACH ... AS).
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
