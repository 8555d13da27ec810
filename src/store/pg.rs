use anyhow::{Context, Result};
use chrono::NaiveDate;
use postgres::{error::SqlState, types::ToSql, Client, NoTls};
use tracing::{debug, info};

use super::{quote_ident, Dialect, TableStore, Value};
use crate::config::PgConfig;
use crate::schema::ColumnType;

/// Production store on a synchronous Postgres connection.
pub struct PgStore {
    client: Client,
}

fn connect_to(cfg: &PgConfig, dbname: &str) -> std::result::Result<Client, postgres::Error> {
    postgres::Config::new()
        .host(&cfg.host)
        .port(cfg.port)
        .user(&cfg.user)
        .password(&cfg.password)
        .dbname(dbname)
        .connect(NoTls)
}

impl PgStore {
    /// Connect to the configured database, creating it first through the
    /// `postgres` maintenance database when the server reports it missing.
    pub fn connect(cfg: &PgConfig) -> Result<Self> {
        match connect_to(cfg, &cfg.dbname) {
            Ok(client) => {
                debug!(host = %cfg.host, db = %cfg.dbname, "connected");
                Ok(Self { client })
            }
            Err(e) if e.code() == Some(&SqlState::INVALID_CATALOG_NAME) => {
                info!(db = %cfg.dbname, "database does not exist; creating");
                let mut admin = connect_to(cfg, "postgres").with_context(|| {
                    format!("connecting to maintenance database on {}", cfg.host)
                })?;
                admin
                    .batch_execute(&format!("CREATE DATABASE {}", quote_ident(&cfg.dbname)))
                    .with_context(|| format!("creating database {}", cfg.dbname))?;
                drop(admin);
                let client = connect_to(cfg, &cfg.dbname)
                    .with_context(|| format!("connecting to {} after creating it", cfg.dbname))?;
                info!(db = %cfg.dbname, "database created");
                Ok(Self { client })
            }
            Err(e) => Err(e).with_context(|| {
                format!(
                    "connecting to postgres at {}:{} as {}",
                    cfg.host, cfg.port, cfg.user
                )
            }),
        }
    }

    /// Connect without the bootstrap: a missing database is an error.
    pub fn connect_existing(cfg: &PgConfig) -> Result<Self> {
        let client = connect_to(cfg, &cfg.dbname).with_context(|| {
            format!(
                "connecting to {} at {}:{} as {}",
                cfg.dbname, cfg.host, cfg.port, cfg.user
            )
        })?;
        Ok(Self { client })
    }
}

/// Placeholder with an explicit cast, so the server takes the parameter type
/// from the value we bind rather than from the column. Lets `f64` land in a
/// NUMERIC column.
fn placeholder(i: usize, ty: ColumnType) -> String {
    match ty {
        ColumnType::Text => format!("${}::TEXT", i),
        ColumnType::Numeric => format!("${}::DOUBLE PRECISION", i),
        ColumnType::Date => format!("${}::DATE", i),
    }
}

fn to_param(value: &Value, ty: ColumnType) -> Box<dyn ToSql + Sync> {
    match (ty, value) {
        (ColumnType::Numeric, Value::Number(n)) => Box::new(Some(*n)),
        (ColumnType::Numeric, _) => Box::new(None::<f64>),
        (ColumnType::Date, Value::Date(d)) => Box::new(Some(*d)),
        (ColumnType::Date, _) => Box::new(None::<NaiveDate>),
        (ColumnType::Text, Value::Text(s)) => Box::new(Some(s.clone())),
        (ColumnType::Text, Value::Number(n)) => Box::new(Some(n.to_string())),
        (ColumnType::Text, Value::Date(d)) => Box::new(Some(d.format("%Y-%m-%d").to_string())),
        (ColumnType::Text, Value::Missing) => Box::new(None::<String>),
    }
}

impl TableStore for PgStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").context("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").context("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").context("ROLLBACK")
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = current_schema() AND table_name = $1
                )",
                &[&table],
            )
            .with_context(|| format!("checking for table {}", table))?;
        Ok(row.get(0))
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::TEXT FROM information_schema.columns
                 WHERE table_schema = current_schema() AND table_name = $1
                 ORDER BY ordinal_position",
                &[&table],
            )
            .with_context(|| format!("listing columns of {}", table))?;
        Ok(rows
            .iter()
            .map(|r| r.get::<_, String>(0))
            .collect())
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .with_context(|| format!("executing `{}`", sql))
    }

    fn count_rows_for_date(
        &mut self,
        table: &str,
        date_column: &str,
        date: NaiveDate,
    ) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            quote_ident(table),
            quote_ident(date_column)
        );
        let row = self
            .client
            .query_one(sql.as_str(), &[&date])
            .with_context(|| format!("counting rows of {} for {}", table, date))?;
        let n: i64 = row.get(0);
        Ok(n as u64)
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
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
        let placeholders = types
            .iter()
            .enumerate()
            .map(|(i, ty)| placeholder(i + 1, *ty))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            cols,
            placeholders
        );

        let stmt = self
            .client
            .prepare(&sql)
            .with_context(|| format!("preparing insert into {}", table))?;
        let mut inserted = 0u64;
        for row in rows {
            let params: Vec<Box<dyn ToSql + Sync>> = row
                .iter()
                .zip(types)
                .map(|(v, ty)| to_param(v, *ty))
                .collect();
            let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
            inserted += self
                .client
                .execute(&stmt, &refs)
                .with_context(|| format!("inserting into {}", table))?;
        }
        Ok(inserted)
    }
}
