//! Importer configuration.
//!
//! Built in three layers: compiled-in defaults, an optional YAML file, then
//! the `PG*` environment variables (a `.env` file is honoured).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, env, fs, path::Path, path::PathBuf};
use tracing::debug;

use crate::schema::types::{default_columns, default_legacy_renames, Column, ColumnType};
use crate::schema::{CanonicalSchema, DATE_COLUMN, ID_COLUMN};
use crate::snapshot::default_sentinels;

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("static regex"));

/// Postgres connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "admin".to_string(),
            dbname: "Nepse".to_string(),
        }
    }
}

impl PgConfig {
    /// Defaults overridden by `PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`,
    /// `PGDATABASE`.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var("PGHOST") {
            self.host = v;
        }
        if let Ok(v) = env::var("PGPORT") {
            self.port = v
                .trim()
                .parse()
                .with_context(|| format!("PGPORT `{}` is not a port number", v))?;
        }
        if let Ok(v) = env::var("PGUSER") {
            self.user = v;
        }
        if let Ok(v) = env::var("PGPASSWORD") {
            self.password = v;
        }
        if let Ok(v) = env::var("PGDATABASE") {
            self.dbname = v;
        }
        Ok(())
    }
}

/// Which database the importer writes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Postgres(PgConfig),
    Sqlite { path: PathBuf },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::Postgres(PgConfig::default())
    }
}

/// Everything the importer needs, handed over at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub source_dir: PathBuf,
    /// Defaults to `<source_dir>/processed`.
    pub processed_dir: Option<PathBuf>,
    pub move_processed: bool,
    pub table: String,
    /// Dates on or before this are never imported.
    pub cutoff: NaiveDate,
    pub identity_column: String,
    pub columns: Vec<Column>,
    pub legacy_renames: Vec<(String, String)>,
    pub sentinels: Vec<String>,
    pub database: DatabaseConfig,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("sharesansarAPI"),
            processed_dir: None,
            move_processed: false,
            table: "historicdata".to_string(),
            cutoff: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            identity_column: "symbol".to_string(),
            columns: default_columns(),
            legacy_renames: default_legacy_renames(),
            sentinels: default_sentinels(),
            database: DatabaseConfig::default(),
        }
    }
}

impl ImporterConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                let cfg: ImporterConfig = serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing config {}", p.display()))?;
                debug!(path = %p.display(), "loaded config file");
                cfg
            }
            None => Self::default(),
        };

        if let DatabaseConfig::Postgres(pg) = &mut cfg.database {
            pg.apply_env()?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.processed_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.join("processed"))
    }

    pub fn schema(&self) -> CanonicalSchema {
        CanonicalSchema::new(
            self.columns.clone(),
            self.identity_column.clone(),
            self.legacy_renames.clone(),
        )
    }

    /// Reject names that would need quoting tricks or collide with the
    /// columns every table carries.
    pub fn validate(&self) -> Result<()> {
        if !IDENT.is_match(&self.table) {
            bail!("table name `{}` is not a plain identifier", self.table);
        }
        if self.columns.is_empty() {
            bail!("no canonical columns configured");
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !IDENT.is_match(&col.name) {
                bail!("column name `{}` is not a plain identifier", col.name);
            }
            if col.name == ID_COLUMN || col.name == DATE_COLUMN {
                bail!("column `{}` is managed by the importer", col.name);
            }
            if col.ty == ColumnType::Date {
                bail!("column `{}`: only the `date` column may be a date", col.name);
            }
            if !seen.insert(col.name.as_str()) {
                bail!("column `{}` listed twice", col.name);
            }
        }

        match self.columns.iter().find(|c| c.name == self.identity_column) {
            Some(c) if c.ty == ColumnType::Text => {}
            Some(_) => bail!("identity column `{}` must be text", self.identity_column),
            None => bail!(
                "identity column `{}` is not among the columns",
                self.identity_column
            ),
        }

        for (old, new) in &self.legacy_renames {
            if !IDENT.is_match(old) || !IDENT.is_match(new) {
                bail!("legacy rename `{}` -> `{}` is not a pair of identifiers", old, new);
            }
        }
        Ok(())
    }
}
