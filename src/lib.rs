pub mod config;
pub mod history;
pub mod import;
pub mod logging;
pub mod schema;
pub mod snapshot;
pub mod store;

use anyhow::Result;

use crate::config::DatabaseConfig;
use crate::store::{PgStore, SqliteStore, TableStore};

/// Open the store `db` points at.
pub fn open_store(db: &DatabaseConfig) -> Result<Box<dyn TableStore>> {
    Ok(match db {
        DatabaseConfig::Postgres(pg) => Box::new(PgStore::connect(pg)?),
        DatabaseConfig::Sqlite { path } => Box::new(SqliteStore::open(path)?),
    })
}
