use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

use super::{quote_ident, Dialect, TableStore, Value};
use crate::schema::ColumnType;

/// Embedded store backed by a single SQLite file (or memory).
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database on disk at `path`, creating the file if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite database {}", path.display()))?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self { conn })
    }

    /// Open an existing database without write access. Fails rather than
    /// creating a missing file.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening sqlite database {} read-only", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite database")?;
        Ok(Self { conn })
    }

    /// Raw connection, for inspection outside the importer.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => SqlValue::Real(*n),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Missing => SqlValue::Null,
    }
}

impl TableStore for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN").context("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").context("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").context("ROLLBACK")
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let n: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![table],
                |r| r.get(0),
            )
            .with_context(|| format!("checking for table {}", table))?;
        Ok(n > 0)
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .context("preparing column listing")?;
        let names = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("listing columns of {}", table))?;
        Ok(names)
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .with_context(|| format!("executing `{}`", sql))
    }

    fn count_rows_for_date(
        &mut self,
        table: &str,
        date_column: &str,
        date: NaiveDate,
    ) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(date_column)
        );
        let n: i64 = self
            .conn
            .query_row(&sql, params![date], |r| r.get(0))
            .with_context(|| format!("counting rows of {} for {}", table, date))?;
        Ok(n as u64)
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        _types: &[ColumnType],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let cols = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            cols,
            placeholders
        );

        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .with_context(|| format!("preparing insert into {}", table))?;
        let mut inserted = 0u64;
        for row in rows {
            inserted += stmt
                .execute(params_from_iter(row.iter().map(to_sql_value)))
                .with_context(|| format!("inserting into {}", table))? as u64;
        }
        Ok(inserted)
    }
}
