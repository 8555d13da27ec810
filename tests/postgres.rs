//! Needs a reachable server; configure with the PG* variables and run with
//! `--ignored`.

use anyhow::Result;
use chrono::NaiveDate;
use nepseloader::{
    config::{DatabaseConfig, ImporterConfig, PgConfig},
    import::{Importer, Outcome},
    store::{PgStore, TableStore},
};
use std::fs;
use tempfile::tempdir;

#[test]
#[ignore]
fn test_postgres_round_trip() -> Result<()> {
    let pg = PgConfig::from_env()?;
    let table = format!("historicdata_it_{}", std::process::id());

    let tmp = tempdir()?;
    let file = tmp.path().join("2024_01_10.csv");
    fs::write(
        &file,
        "Symbol,Open,Close,Vol,Prev. Close\nNABIL,500,505,\"1,200\",N/A\nNICA,800,790,300,801\n",
    )?;

    let cfg = ImporterConfig {
        source_dir: tmp.path().to_path_buf(),
        table: table.clone(),
        database: DatabaseConfig::Postgres(pg.clone()),
        ..ImporterConfig::default()
    };
    let mut imp = Importer::new(PgStore::connect(&pg)?, cfg)?;

    let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    assert_eq!(imp.import_file(&file)?, Outcome::Imported { date: day, rows: 2 });
    assert_eq!(
        imp.import_file(&file)?,
        Outcome::AlreadyImported { date: day, rows: 2 }
    );
    assert_eq!(imp.store_mut().count_rows_for_date(&table, "date", day)?, 2);

    imp.store_mut()
        .execute(&format!("DROP TABLE \"{}\"", table))?;
    Ok(())
}

#[test]
#[ignore]
fn test_postgres_mixed_case_columns() -> Result<()> {
    let pg = PgConfig::from_env()?;
    let table = format!("historicdata_case_{}", std::process::id());

    let mut store = PgStore::connect(&pg)?;
    store.execute(&format!(
        r#"CREATE TABLE "{t}" ("id" BIGSERIAL PRIMARY KEY, "date" DATE, "Symbol" TEXT, "Legacy" TEXT);
           INSERT INTO "{t}" ("date", "Symbol", "Legacy") VALUES ('2024-01-09', 'OLD', 'x');"#,
        t = table
    ))?;

    let tmp = tempdir()?;
    let file = tmp.path().join("2024_01_10.csv");
    fs::write(&file, "Symbol,Close\nNABIL,505\n")?;

    let cfg = ImporterConfig {
        source_dir: tmp.path().to_path_buf(),
        table: table.clone(),
        database: DatabaseConfig::Postgres(pg.clone()),
        ..ImporterConfig::default()
    };
    let mut imp = Importer::new(store, cfg)?;
    let summary = imp.run(tmp.path())?;
    assert_eq!(summary.imported_files, 1);
    assert_eq!(summary.failed_files, 0);

    let cols = imp.store_mut().column_names(&table)?;
    assert!(cols.contains(&"symbol".to_string()));
    assert!(!cols.iter().any(|c| c == "Symbol" || c == "Legacy"));

    // the renamed column kept its data
    let day = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
    assert_eq!(imp.store_mut().count_rows_for_date(&table, "date", day)?, 1);

    imp.store_mut()
        .execute(&format!("DROP TABLE \"{}\"", table))?;
    Ok(())
}
