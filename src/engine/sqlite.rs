use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension};

use super::{
    backup_name, is_plain_identifier, split_qualified, Engine, EngineError, RowVisitor, Value,
    TABLE_INFO_TABLE,
};

/// SQLite-backed store: the project database on one connection, annotation
/// and genotype databases attached under their own schema names.
pub struct SqliteEngine {
    connection: Connection,
}

impl SqliteEngine {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let connection = Connection::open(path)?;
        Ok(SqliteEngine { connection })
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        let connection = Connection::open_in_memory()?;
        Ok(SqliteEngine { connection })
    }

    /// Run several `;`-separated statements at once (fixtures, schema setup).
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), EngineError> {
        self.connection.execute_batch(sql)?;
        Ok(())
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl Engine for SqliteEngine {
    fn execute(&mut self, sql: &str) -> Result<usize, EngineError> {
        log::trace!("execute: {}", sql);
        Ok(self.connection.execute(sql, [])?)
    }

    fn for_each_row(&mut self, sql: &str, visit: &mut RowVisitor<'_>) -> Result<u64, EngineError> {
        log::trace!("query: {}", sql);
        let mut statement = self.connection.prepare(sql)?;
        let column_count = statement.column_count();
        let mut rows = statement.query([])?;
        let mut buffer: Vec<Value> = Vec::with_capacity(column_count);
        let mut visited = 0u64;
        while let Some(row) = rows.next()? {
            buffer.clear();
            for idx in 0..column_count {
                buffer.push(Value::from(row.get_ref(idx)?));
            }
            visit(&buffer)?;
            visited += 1;
        }
        Ok(visited)
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        // Statements run in autocommit mode unless a caller opened a transaction.
        if !self.connection.is_autocommit() {
            self.connection.execute_batch("COMMIT;")?;
        }
        Ok(())
    }

    fn has_table(&mut self, name: &str) -> Result<bool, EngineError> {
        let (schema, table) = split_qualified(name);
        let masters: Vec<String> = match schema {
            Some(schema) => {
                if !is_plain_identifier(schema) {
                    return Err(EngineError::InvalidIdentifier(schema.to_string()));
                }
                if schema.eq_ignore_ascii_case("temp") {
                    vec!["sqlite_temp_master".to_string()]
                } else {
                    vec![format!("{}.sqlite_master", schema)]
                }
            }
            None => vec!["sqlite_master".to_string(), "sqlite_temp_master".to_string()],
        };
        for master in masters {
            let found: Option<String> = self
                .connection
                .query_row(
                    &format!(
                        "SELECT name FROM {} WHERE type = 'table' AND lower(name) = lower(?1)",
                        master
                    ),
                    [table],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn backup_table(&mut self, name: &str) -> Result<String, EngineError> {
        if !self.has_table(name)? {
            return Err(EngineError::NoSuchTable(name.to_string()));
        }
        let new_name = backup_name(name, |candidate| self.has_table(candidate))?;
        self.connection
            .execute(&format!("ALTER TABLE {} RENAME TO {};", name, new_name), [])?;
        log::debug!("Renamed table {} to {}", name, new_name);
        Ok(new_name)
    }

    fn attach(&mut self, path: &Path, name: &str) -> Result<(), EngineError> {
        if !is_plain_identifier(name) {
            return Err(EngineError::InvalidIdentifier(name.to_string()));
        }
        let file = path.to_string_lossy().into_owned();
        self.connection
            .execute(&format!("ATTACH DATABASE ?1 AS {}", name), [file.as_str()])?;
        log::debug!("Attached {} as {}", file, name);
        Ok(())
    }

    fn is_attached(&mut self, name: &str) -> Result<bool, EngineError> {
        let mut statement = self.connection.prepare("PRAGMA database_list")?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names.iter().any(|n| n.eq_ignore_ascii_case(name)))
    }

    fn table_names(&mut self) -> Result<Vec<String>, EngineError> {
        let mut statement = self
            .connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>, EngineError> {
        let (schema, bare) = split_qualified(table);
        if !is_plain_identifier(bare) || !schema.map_or(true, is_plain_identifier) {
            return Err(EngineError::InvalidIdentifier(table.to_string()));
        }
        let pragma = match schema {
            Some(schema) => format!("PRAGMA {}.table_info({})", schema, bare),
            None => format!("PRAGMA table_info({})", bare),
        };
        let mut statement = self.connection.prepare(&pragma)?;
        let columns = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<String>, _>>()?;
        if columns.is_empty() {
            return Err(EngineError::NoSuchTable(table.to_string()));
        }
        Ok(columns)
    }

    fn describe_table(&mut self, table: &str, description: &str) -> Result<(), EngineError> {
        self.connection.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (table_name TEXT PRIMARY KEY, description TEXT)",
                TABLE_INFO_TABLE
            ),
            [],
        )?;
        self.connection.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (table_name, description) VALUES (?1, ?2)",
                TABLE_INFO_TABLE
            ),
            [table, description],
        )?;
        Ok(())
    }
}
