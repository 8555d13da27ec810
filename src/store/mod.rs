//! Database seam for the importer.
//!
//! The importer only ever talks to a [`TableStore`]; the Postgres and SQLite
//! backends differ in DDL spelling and parameter binding, nothing else.

pub mod pg;
pub mod sqlite;

use anyhow::Result;
use chrono::NaiveDate;

use crate::schema::ColumnType;

pub use pg::PgStore;
pub use sqlite::SqliteStore;

/// A coerced cell ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// Stored as SQL NULL. Distinct from zero or the empty string.
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// SQL flavour a store speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Column definition of the generated identity key.
    pub fn identity_column(&self, name: &str) -> String {
        match self {
            Dialect::Postgres => format!("{} BIGSERIAL PRIMARY KEY", quote_ident(name)),
            Dialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(name)),
        }
    }

    pub fn type_name(&self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (_, ColumnType::Text) => "TEXT",
            (_, ColumnType::Date) => "DATE",
            (Dialect::Postgres, ColumnType::Numeric) => "NUMERIC",
            (Dialect::Sqlite, ColumnType::Numeric) => "REAL",
        }
    }
}

/// Double-quote an identifier so reserved words (`range`, `date`, ...) are
/// safe as column names.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// What the importer needs from a relational database.
///
/// Transactions are explicit: the caller brackets one file's work with
/// [`begin`](TableStore::begin) and either [`commit`](TableStore::commit) or
/// [`rollback`](TableStore::rollback). DDL issued in between is part of the
/// same transaction on both backends.
pub trait TableStore {
    fn dialect(&self) -> Dialect;

    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Column names of `table` in ordinal order, spelled as stored.
    fn column_names(&mut self, table: &str) -> Result<Vec<String>>;

    /// Run a statement that returns no rows (DDL mostly).
    fn execute(&mut self, sql: &str) -> Result<()>;

    fn count_rows_for_date(&mut self, table: &str, date_column: &str, date: NaiveDate)
        -> Result<u64>;

    /// Insert every row in one batch. `types` gives the declared type of each
    /// entry in `columns`; rows are aligned with `columns`.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
        rows: &[Vec<Value>],
    ) -> Result<u64>;
}

impl<S: TableStore + ?Sized> TableStore for Box<S> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }
    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }
    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }
    fn table_exists(&mut self, table: &str) -> Result<bool> {
        (**self).table_exists(table)
    }
    fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        (**self).column_names(table)
    }
    fn execute(&mut self, sql: &str) -> Result<()> {
        (**self).execute(sql)
    }
    fn count_rows_for_date(
        &mut self,
        table: &str,
        date_column: &str,
        date: NaiveDate,
    ) -> Result<u64> {
        (**self).count_rows_for_date(table, date_column, date)
    }
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
        rows: &[Vec<Value>],
    ) -> Result<u64> {
        (**self).insert_rows(table, columns, types, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("range"), "\"range\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_dialect_types() {
        assert_eq!(Dialect::Postgres.type_name(ColumnType::Numeric), "NUMERIC");
        assert_eq!(Dialect::Sqlite.type_name(ColumnType::Numeric), "REAL");
        assert_eq!(Dialect::Sqlite.type_name(ColumnType::Date), "DATE");
        assert_eq!(
            Dialect::Sqlite.identity_column("id"),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
    }
}
