use anyhow::Result;
use chrono::NaiveDate;
use nepseloader::{
    config::ImporterConfig,
    import::{Importer, Outcome, SkipReason, StopReason},
    store::{SqliteStore, TableStore},
};
use std::{fs, path::Path};
use tempfile::tempdir;

const HEADER: &str = "S.No,Symbol,Conf.,Open,High,Low,Close,LTP,Close - LTP,Close - LTP %,VWAP,Vol,Prev. Close,Turnover,Trans.,Diff,Range,Diff %,Range %,VWAP %,52 Weeks High,52 Weeks Low";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A snapshot with `n` rows; symbols are `<prefix>0`, `<prefix>1`, ...
fn snapshot(n: usize, prefix: &str) -> String {
    let mut s = format!("{HEADER}\n");
    for i in 0..n {
        s.push_str(&format!(
            "{},{}{},50.1,500,510,495,505,504,1,0.2,503.5,\"1,200\",498,\"604,200.00\",31,7,15,1.4,3.03,0.3,620,410\n",
            i + 1,
            prefix,
            i
        ));
    }
    s
}

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn importer(dir: &Path) -> Importer<SqliteStore> {
    let cfg = ImporterConfig {
        source_dir: dir.to_path_buf(),
        ..ImporterConfig::default()
    };
    Importer::new(SqliteStore::open_in_memory().unwrap(), cfg).unwrap()
}

fn count_for(importer: &Importer<SqliteStore>, day: NaiveDate) -> i64 {
    importer
        .store()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM historicdata WHERE date = ?1",
            [day],
            |r| r.get(0),
        )
        .unwrap()
}

fn total_rows(importer: &Importer<SqliteStore>) -> i64 {
    importer
        .store()
        .connection()
        .query_row("SELECT COUNT(*) FROM historicdata", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn test_import_then_reimport_is_noop() -> Result<()> {
    let tmp = tempdir()?;
    let file = write(tmp.path(), "2024_01_10.csv", &snapshot(50, "SYM"));
    let mut imp = importer(tmp.path());

    let first = imp.import_file(&file)?;
    assert_eq!(
        first,
        Outcome::Imported {
            date: date(2024, 1, 10),
            rows: 50
        }
    );
    assert_eq!(count_for(&imp, date(2024, 1, 10)), 50);

    let second = imp.import_file(&file)?;
    assert_eq!(
        second,
        Outcome::AlreadyImported {
            date: date(2024, 1, 10),
            rows: 50
        }
    );
    assert_eq!(total_rows(&imp), 50);
    Ok(())
}

#[test]
fn test_count_mismatch_reads_as_not_imported() -> Result<()> {
    let tmp = tempdir()?;
    let day = date(2024, 1, 10);
    let file = write(tmp.path(), "2024_01_10.csv", &snapshot(3, "A"));
    let mut imp = importer(tmp.path());
    imp.import_file(&file)?;
    assert_eq!(count_for(&imp, day), 3);

    // table has fewer rows for the day than the file
    write(tmp.path(), "2024_01_10.csv", &snapshot(5, "B"));
    assert!(!imp.is_already_imported(day, 5)?);
    assert_eq!(
        imp.import_file(&file)?,
        Outcome::Imported { date: day, rows: 5 }
    );
    assert_eq!(count_for(&imp, day), 8);

    // and more rows than the file
    write(tmp.path(), "2024_01_10.csv", &snapshot(2, "C"));
    assert_eq!(
        imp.import_file(&file)?,
        Outcome::Imported { date: day, rows: 2 }
    );
    assert_eq!(count_for(&imp, day), 10);
    Ok(())
}

#[test]
fn test_values_are_coerced() -> Result<()> {
    let tmp = tempdir()?;
    let body = format!(
        "{HEADER}\n1,NABIL,50,500,510,495,505,504,1,0.2,503.5,\"12,345\",N/A,\"6,213,000.50\",321,7,15,1.4,3.03,0.3,620,410\n"
    );
    let file = write(tmp.path(), "2024-01-10.csv", &body);
    let mut imp = importer(tmp.path());
    imp.import_file(&file)?;

    let (symbol, vol, turnover, prev_close, d): (String, f64, f64, Option<f64>, String) = imp
        .store()
        .connection()
        .query_row(
            "SELECT symbol, vol, turnover, prev_close, date FROM historicdata",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )?;
    assert_eq!(symbol, "NABIL");
    assert_eq!(vol, 12345.0);
    assert_eq!(turnover, 6213000.5);
    assert_eq!(prev_close, None);
    assert_eq!(d, "2024-01-10");
    Ok(())
}

#[test]
fn test_sentinel_file_leaves_date_unimported() -> Result<()> {
    let tmp = tempdir()?;
    let file = write(
        tmp.path(),
        "2024_01_13.csv",
        &format!("{HEADER}\nNo Record Found.\n"),
    );
    let mut imp = importer(tmp.path());

    let outcome = imp.import_file(&file)?;
    assert_eq!(
        outcome,
        Outcome::Skipped {
            date: Some(date(2024, 1, 13)),
            reason: SkipReason::NoRecords
        }
    );
    // the store was never touched, so the check must still say "not imported"
    imp.ensure_schema()?;
    assert_eq!(total_rows(&imp), 0);
    assert!(!imp.is_already_imported(date(2024, 1, 13), 1)?);
    Ok(())
}

#[test]
fn test_unparseable_filename_is_skipped() -> Result<()> {
    let tmp = tempdir()?;
    let file = write(tmp.path(), "latest.csv", &snapshot(3, "SYM"));
    let mut imp = importer(tmp.path());

    let outcome = imp.import_file(&file)?;
    assert_eq!(
        outcome,
        Outcome::Skipped {
            date: None,
            reason: SkipReason::UnparseableDate
        }
    );
    assert!(!imp.store_mut().table_exists("historicdata")?);
    Ok(())
}

#[test]
fn test_run_imports_newest_first() -> Result<()> {
    let tmp = tempdir()?;
    write(tmp.path(), "2024_01_10.csv", &snapshot(10, "A"));
    write(tmp.path(), "2024_01_09.csv", &snapshot(8, "B"));
    write(tmp.path(), "notes.csv", &snapshot(2, "C"));
    let mut imp = importer(tmp.path());

    let summary = imp.run(tmp.path())?;
    assert_eq!(summary.imported_files, 2);
    assert_eq!(summary.imported_rows, 18);
    assert_eq!(summary.stopped, StopReason::Exhausted);
    assert_eq!(total_rows(&imp), 18);
    assert_eq!(count_for(&imp, date(2024, 1, 10)), 10);
    assert_eq!(count_for(&imp, date(2024, 1, 9)), 8);

    let dated: Vec<_> = summary
        .files
        .iter()
        .filter_map(|(_, o)| match o {
            Outcome::Imported { date, .. } => Some(*date),
            _ => None,
        })
        .collect();
    assert_eq!(dated, vec![date(2024, 1, 10), date(2024, 1, 9)]);
    Ok(())
}

#[test]
fn test_run_stops_at_present_date() -> Result<()> {
    let tmp = tempdir()?;
    write(tmp.path(), "2024_01_08.csv", &snapshot(4, "A"));
    write(tmp.path(), "2024_01_09.csv", &snapshot(5, "B"));
    let mut imp = importer(tmp.path());
    imp.run(tmp.path())?;
    assert_eq!(total_rows(&imp), 9);

    write(tmp.path(), "2024_01_10.csv", &snapshot(6, "C"));
    // an older file appearing later is not reached: the walk stops at the 9th
    write(tmp.path(), "2024_01_07.csv", &snapshot(3, "D"));
    let summary = imp.run(tmp.path())?;

    assert_eq!(summary.imported_files, 1);
    assert_eq!(
        summary.stopped,
        StopReason::AlreadyPresent {
            date: date(2024, 1, 9),
            rows: 5
        }
    );
    assert_eq!(total_rows(&imp), 15);
    assert_eq!(count_for(&imp, date(2024, 1, 7)), 0);
    Ok(())
}

#[test]
fn test_run_stops_at_cutoff() -> Result<()> {
    let tmp = tempdir()?;
    write(tmp.path(), "2020_01_02.csv", &snapshot(2, "A"));
    write(tmp.path(), "2020_01_01.csv", &snapshot(2, "B"));
    write(tmp.path(), "2019_12_31.csv", &snapshot(2, "C"));
    let mut imp = importer(tmp.path());

    let summary = imp.run(tmp.path())?;
    assert_eq!(summary.imported_files, 1);
    assert_eq!(
        summary.stopped,
        StopReason::Cutoff {
            date: date(2020, 1, 1)
        }
    );
    assert_eq!(total_rows(&imp), 2);
    Ok(())
}

#[test]
fn test_failed_file_rolls_back_and_run_continues() -> Result<()> {
    let tmp = tempdir()?;
    write(tmp.path(), "2024_01_10.csv", &snapshot(5, "OK"));
    let mut bad = snapshot(3, "X");
    bad.push_str("4,BAD,1,1,1,1,1,1,0,0,1,1,1,1,1,0,0,0,0,0,1,1\n");
    write(tmp.path(), "2024_01_09.csv", &bad);
    write(tmp.path(), "2024_01_08.csv", &snapshot(2, "OLD"));

    let mut imp = importer(tmp.path());
    imp.ensure_schema()?;
    imp.store().connection().execute_batch(
        "CREATE TRIGGER reject_bad BEFORE INSERT ON historicdata
         WHEN NEW.symbol = 'BAD'
         BEGIN SELECT RAISE(ABORT, 'bad symbol'); END;",
    )?;

    let summary = imp.run(tmp.path())?;
    assert_eq!(summary.failed_files, 1);
    assert_eq!(summary.imported_files, 2);
    assert_eq!(count_for(&imp, date(2024, 1, 10)), 5);
    // none of the three good rows before the bad one survive
    assert_eq!(count_for(&imp, date(2024, 1, 9)), 0);
    assert_eq!(count_for(&imp, date(2024, 1, 8)), 2);

    let failed = summary
        .files
        .iter()
        .find(|(_, o)| o.is_failed())
        .map(|(p, _)| p.clone());
    assert_eq!(failed, Some(tmp.path().join("2024_01_09.csv")));
    Ok(())
}

#[test]
fn test_move_processed() -> Result<()> {
    let tmp = tempdir()?;
    write(tmp.path(), "2024_01_10.csv", &snapshot(3, "A"));
    write(
        tmp.path(),
        "2024_01_11.csv",
        &format!("{HEADER}\nNo Record Found.\n"),
    );
    write(tmp.path(), "2024_01_12.csv", "");

    let cfg = ImporterConfig {
        source_dir: tmp.path().to_path_buf(),
        move_processed: true,
        ..ImporterConfig::default()
    };
    let processed = cfg.processed_dir();
    let mut imp = Importer::new(SqliteStore::open_in_memory()?, cfg)?;
    let summary = imp.run(tmp.path())?;
    assert_eq!(summary.imported_files, 1);

    assert!(processed.join("2024_01_10.csv").is_file());
    assert!(processed.join("2024_01_11.csv").is_file());
    // empty files stay for someone to look at
    assert!(tmp.path().join("2024_01_12.csv").is_file());
    assert!(!tmp.path().join("2024_01_10.csv").exists());
    Ok(())
}

#[test]
fn test_schema_evolves_existing_table() -> Result<()> {
    let tmp = tempdir()?;
    let file = write(tmp.path(), "2024_01_10.csv", &snapshot(2, "A"));
    let mut imp = importer(tmp.path());
    imp.store().connection().execute_batch(
        "CREATE TABLE historicdata (id INTEGER PRIMARY KEY AUTOINCREMENT, symbol TEXT,
             close_ltp REAL, legacy_note TEXT);
         INSERT INTO historicdata (symbol, close_ltp, legacy_note) VALUES ('OLD', 2.5, 'x');",
    )?;

    imp.import_file(&file)?;

    let cols = imp.store_mut().column_names("historicdata")?;
    assert!(cols.contains(&"date".to_string()));
    assert!(cols.contains(&"close_minus_ltp".to_string()));
    assert!(!cols.contains(&"close_ltp".to_string()));
    assert!(!cols.contains(&"legacy_note".to_string()));

    let kept: f64 = imp.store().connection().query_row(
        "SELECT close_minus_ltp FROM historicdata WHERE symbol = 'OLD'",
        [],
        |r| r.get(0),
    )?;
    assert_eq!(kept, 2.5);
    assert_eq!(count_for(&imp, date(2024, 1, 10)), 2);
    Ok(())
}
