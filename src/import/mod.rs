//! The dated-snapshot importer.
//!
//! Each snapshot file holds one trading day. A file is imported inside one
//! transaction (schema reconciliation, the already-imported check and the
//! batched insert), so a failure leaves no rows behind for its date.
//! Only failures of the connection itself abort a run.

pub mod outcome;

pub use outcome::{Outcome, RunSummary, SkipReason, StopReason};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, warn};

use crate::config::ImporterConfig;
use crate::history::ProcessedFiles;
use crate::schema::{self, CanonicalSchema, ColumnType, SchemaChange, DATE_COLUMN};
use crate::snapshot::{list_csv_files, parse_date_from_filename, read_snapshot_file, SnapshotContent};
use crate::store::{TableStore, Value};

pub struct Importer<S: TableStore> {
    store: S,
    config: ImporterConfig,
    schema: CanonicalSchema,
    processed: Option<ProcessedFiles>,
}

impl<S: TableStore> Importer<S> {
    pub fn new(store: S, config: ImporterConfig) -> Result<Self> {
        config.validate()?;
        let processed = if config.move_processed {
            Some(ProcessedFiles::new(config.processed_dir())?)
        } else {
            None
        };
        Ok(Self {
            schema: config.schema(),
            store,
            config,
            processed,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Reconcile the target table in a transaction of its own.
    pub fn ensure_schema(&mut self) -> Result<Vec<SchemaChange>> {
        self.store.begin()?;
        match schema::ensure_schema(&mut self.store, &self.config.table, &self.schema) {
            Ok(changes) => {
                self.store.commit()?;
                Ok(changes)
            }
            Err(e) => {
                self.store
                    .rollback()
                    .context("rolling back failed schema reconciliation")?;
                Err(e)
            }
        }
    }

    /// Rows for `date` already in the table equal the rows in the file.
    ///
    /// This is a count heuristic: any other relation, including the table
    /// holding fewer rows than the file, reads as "not imported yet".
    pub fn is_already_imported(&mut self, date: NaiveDate, file_rows: usize) -> Result<bool> {
        let in_table = self
            .store
            .count_rows_for_date(&self.config.table, DATE_COLUMN, date)?;
        Ok(in_table == file_rows as u64)
    }

    /// Import one snapshot file.
    ///
    /// Problems with the file itself come back as an [`Outcome`]; an `Err`
    /// means the database connection is unusable.
    pub fn import_file(&mut self, path: &Path) -> Result<Outcome> {
        let Some(date) = parse_date_from_filename(path) else {
            warn!(file = %path.display(), "could not parse date from filename; skipping");
            return Ok(Outcome::Skipped {
                date: None,
                reason: SkipReason::UnparseableDate,
            });
        };

        let content = match read_snapshot_file(path, &self.schema, &self.config.sentinels) {
            Ok(c) => c,
            Err(e) => {
                error!(file = %path.display(), "unreadable snapshot: {:#}", e);
                return Ok(Outcome::Failed {
                    date: Some(date),
                    error: format!("{:#}", e),
                });
            }
        };

        let rows = match content {
            SnapshotContent::Rows { rows, skipped_rows } => {
                if skipped_rows > 0 {
                    info!(file = %path.display(), skipped_rows, "rows without identity skipped");
                }
                rows
            }
            SnapshotContent::Sentinel => {
                info!(file = %path.display(), %date, "no record found; nothing to import");
                return self.finish(
                    path,
                    Outcome::Skipped {
                        date: Some(date),
                        reason: SkipReason::NoRecords,
                    },
                );
            }
            SnapshotContent::Empty => {
                warn!(file = %path.display(), "no valid data rows; skipping");
                return Ok(Outcome::Skipped {
                    date: Some(date),
                    reason: SkipReason::Empty,
                });
            }
        };

        let start = Instant::now();
        self.store.begin()?;
        let outcome = match self.import_rows(date, rows) {
            Ok(outcome) => match self.store.commit() {
                Ok(()) => outcome,
                Err(e) => self.abandon(path, date, e)?,
            },
            Err(e) => self.abandon(path, date, e)?,
        };

        if let Outcome::Imported { rows, .. } = &outcome {
            info!(file = %path.display(), %date, rows, elapsed = ?start.elapsed(), "imported");
        }
        self.finish(path, outcome)
    }

    /// Body of the per-file transaction.
    fn import_rows(&mut self, date: NaiveDate, rows: Vec<Vec<Value>>) -> Result<Outcome> {
        schema::ensure_schema(&mut self.store, &self.config.table, &self.schema)?;

        if self.is_already_imported(date, rows.len())? {
            info!(%date, rows = rows.len(), "already imported; skipping");
            return Ok(Outcome::AlreadyImported {
                date,
                rows: rows.len() as u64,
            });
        }

        let mut columns = Vec::with_capacity(self.schema.columns.len() + 1);
        let mut types = Vec::with_capacity(self.schema.columns.len() + 1);
        columns.push(DATE_COLUMN.to_string());
        types.push(ColumnType::Date);
        for c in &self.schema.columns {
            columns.push(c.name.clone());
            types.push(c.ty);
        }

        let tagged: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|row| {
                let mut out = Vec::with_capacity(row.len() + 1);
                out.push(Value::Date(date));
                out.extend(row);
                out
            })
            .collect();

        let inserted = self
            .store
            .insert_rows(&self.config.table, &columns, &types, &tagged)?;
        Ok(Outcome::Imported {
            date,
            rows: inserted,
        })
    }

    /// Roll back a failed file. A rollback that itself fails means the
    /// connection is gone, which is fatal.
    fn abandon(&mut self, path: &Path, date: NaiveDate, e: anyhow::Error) -> Result<Outcome> {
        self.store
            .rollback()
            .with_context(|| format!("rolling back {} after: {:#}", path.display(), e))?;
        error!(file = %path.display(), %date, "import failed, rolled back: {:#}", e);
        Ok(Outcome::Failed {
            date: Some(date),
            error: format!("{:#}", e),
        })
    }

    /// Move consumed files out of the source directory when configured to.
    fn finish(&self, path: &Path, outcome: Outcome) -> Result<Outcome> {
        if let Some(processed) = &self.processed {
            if outcome.is_consumed() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if processed.contains(name) {
                        warn!(file = name, "replacing earlier copy in processed dir");
                    }
                }
                if let Err(e) = processed.mark(path) {
                    error!(file = %path.display(), "could not move to processed: {:#}", e);
                }
            }
        }
        Ok(outcome)
    }

    /// Walk the snapshots in `source_dir` from the newest date back.
    ///
    /// Dates on or before the cutoff are never imported. The walk stops at
    /// the first date the table already has rows for, on the assumption that
    /// everything older was imported by an earlier run.
    pub fn run(&mut self, source_dir: &Path) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        let files = list_csv_files(source_dir)
            .with_context(|| format!("scanning {}", source_dir.display()))?;
        if files.is_empty() {
            info!(dir = %source_dir.display(), "no CSV files found");
            return Ok(summary);
        }

        let mut by_date: BTreeMap<NaiveDate, PathBuf> = BTreeMap::new();
        for path in files {
            match parse_date_from_filename(&path) {
                Some(date) => {
                    if let Some(first) = by_date.get(&date) {
                        warn!(
                            file = %path.display(),
                            kept = %first.display(),
                            %date,
                            "second file for the same date; ignoring it"
                        );
                        summary.record(
                            path,
                            Outcome::Skipped {
                                date: Some(date),
                                reason: SkipReason::DuplicateDate,
                            },
                        );
                    } else {
                        by_date.insert(date, path);
                    }
                }
                None => {
                    warn!(file = %path.display(), "could not parse date from filename; skipping");
                    summary.record(
                        path,
                        Outcome::Skipped {
                            date: None,
                            reason: SkipReason::UnparseableDate,
                        },
                    );
                }
            }
        }
        if by_date.is_empty() {
            info!(dir = %source_dir.display(), "no dated CSV files found");
            return Ok(summary);
        }

        self.ensure_schema()?;

        for (date, path) in by_date.into_iter().rev() {
            if date <= self.config.cutoff {
                info!(%date, cutoff = %self.config.cutoff, "reached cutoff; stopping");
                summary.stopped = StopReason::Cutoff { date };
                break;
            }
            let present = self
                .store
                .count_rows_for_date(&self.config.table, DATE_COLUMN, date)?;
            if present > 0 {
                info!(%date, rows = present, "date already in table; stopping");
                summary.stopped = StopReason::AlreadyPresent {
                    date,
                    rows: present,
                };
                break;
            }

            info!(%date, file = %path.display(), "importing");
            let outcome = self.import_file(&path)?;
            summary.record(path, outcome);
        }

        info!(
            imported_files = summary.imported_files,
            imported_rows = summary.imported_rows,
            failed_files = summary.failed_files,
            stopped = ?summary.stopped,
            "run finished"
        );
        Ok(summary)
    }
}
