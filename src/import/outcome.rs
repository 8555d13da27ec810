use chrono::NaiveDate;
use serde::Serialize;
use std::{fmt, path::PathBuf};

/// Why a file was passed over without touching the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No date could be read from the filename.
    UnparseableDate,
    /// Headerless, or no row carried an identity value.
    Empty,
    /// The file's only row was a "no record found" marker.
    NoRecords,
    /// Another file in the same run already carries this date.
    DuplicateDate,
}

/// Result of importing one snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Imported { date: NaiveDate, rows: u64 },
    AlreadyImported { date: NaiveDate, rows: u64 },
    Skipped { date: Option<NaiveDate>, reason: SkipReason },
    /// The file's transaction was rolled back; nothing of it is in the table.
    Failed { date: Option<NaiveDate>, error: String },
}

impl Outcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, Outcome::Imported { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    /// The file has been dealt with for good and may leave the source dir.
    pub fn is_consumed(&self) -> bool {
        matches!(
            self,
            Outcome::Imported { .. }
                | Outcome::AlreadyImported { .. }
                | Outcome::Skipped {
                    reason: SkipReason::NoRecords,
                    ..
                }
        )
    }

    pub fn inserted_rows(&self) -> u64 {
        match self {
            Outcome::Imported { rows, .. } => *rows,
            _ => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Imported { date, rows } => write!(f, "imported {} rows for {}", rows, date),
            Outcome::AlreadyImported { date, rows } => {
                write!(f, "{} rows already present for {}", rows, date)
            }
            Outcome::Skipped { reason, .. } => write!(f, "skipped ({:?})", reason),
            Outcome::Failed { error, .. } => write!(f, "failed: {}", error),
        }
    }
}

/// Why [`run`](super::Importer::run) stopped walking back through dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Every dated file was visited.
    Exhausted,
    /// Reached a date on or before the cutoff.
    Cutoff { date: NaiveDate },
    /// Reached a date the table already holds rows for.
    AlreadyPresent { date: NaiveDate, rows: u64 },
}

/// Per-file log of one run plus totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub files: Vec<(PathBuf, Outcome)>,
    pub imported_files: usize,
    pub imported_rows: u64,
    pub failed_files: usize,
    pub stopped: StopReason,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            imported_files: 0,
            imported_rows: 0,
            failed_files: 0,
            stopped: StopReason::Exhausted,
        }
    }

    pub fn record(&mut self, path: PathBuf, outcome: Outcome) {
        if outcome.is_imported() {
            self.imported_files += 1;
            self.imported_rows += outcome.inserted_rows();
        }
        if outcome.is_failed() {
            self.failed_files += 1;
        }
        self.files.push((path, outcome));
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
