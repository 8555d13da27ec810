pub mod coerce;
pub mod date;
pub mod dedupe;
pub mod reader;

pub use coerce::coerce;
pub use date::parse_date_from_filename;
pub use reader::{default_sentinels, read_snapshot, read_snapshot_file, SnapshotContent};

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// Every `*.csv` directly inside `dir`, extension matched case-insensitively,
/// sorted by path.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let mut files = Vec::new();
    for entry in glob_with(&pattern, options).context("invalid glob pattern for snapshot dir")? {
        let path = entry.with_context(|| format!("listing {}", dir.display()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
