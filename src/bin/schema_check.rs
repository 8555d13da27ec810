//! Print what the importer would change in the target table, without
//! changing anything. Nothing is created either: a missing SQLite file or
//! Postgres database is reported, not bootstrapped.

use anyhow::Result;
use clap::Parser;
use nepseloader::{
    config::{DatabaseConfig, ImporterConfig},
    logging,
    schema::plan_schema,
    store::{Dialect, PgStore, SqliteStore, TableStore},
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Show pending schema changes for the price table")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    sqlite: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init("warn");

    let args = Args::parse();
    let mut cfg = ImporterConfig::load(args.config.as_deref())?;
    if let Some(path) = args.sqlite {
        cfg.database = DatabaseConfig::Sqlite { path };
    }

    let (existing, dialect) = match &cfg.database {
        DatabaseConfig::Sqlite { path } if !path.exists() => {
            println!("{} does not exist yet", path.display());
            (None, Dialect::Sqlite)
        }
        DatabaseConfig::Sqlite { path } => {
            let mut store = SqliteStore::open_read_only(path)?;
            (existing_columns(&mut store, &cfg.table)?, store.dialect())
        }
        DatabaseConfig::Postgres(pg) => {
            let mut store = PgStore::connect_existing(pg)?;
            (existing_columns(&mut store, &cfg.table)?, store.dialect())
        }
    };

    let changes = plan_schema(existing.as_deref(), &cfg.schema());
    if changes.is_empty() {
        println!("{} is up to date", cfg.table);
        return Ok(());
    }
    for change in &changes {
        println!("{};", change.to_sql(&cfg.table, dialect));
    }
    Ok(())
}

fn existing_columns(store: &mut impl TableStore, table: &str) -> Result<Option<Vec<String>>> {
    if store.table_exists(table)? {
        Ok(Some(store.column_names(table)?))
    } else {
        Ok(None)
    }
}
