//! Find snapshot files whose content is the same under different names.
//!
//! Scrapers re-run over a holiday happily write the previous trading day's
//! table again under the new date. Two files count as duplicates when their
//! trimmed cells, taken as a set of rows, are identical.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use super::list_csv_files;

/// Files sharing one content digest; `keep` sorts first by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub digest: String,
    pub keep: PathBuf,
    pub duplicates: Vec<PathBuf>,
}

/// SHA-256 over the file's rows, cells trimmed and rows sorted, so layout
/// differences and row order do not matter.
pub fn content_digest(path: &Path) -> Result<String> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    rows.sort();

    let mut hasher = Sha256::new();
    for row in &rows {
        for cell in row {
            hasher.update(cell.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x1e");
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Group the CSV files in `dir` by content. Only groups with more than one
/// member are returned. Unreadable files are logged and left out.
pub fn find_duplicates(dir: &Path) -> Result<Vec<DuplicateGroup>> {
    let mut by_digest: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in list_csv_files(dir)? {
        match content_digest(&path) {
            Ok(digest) => by_digest.entry(digest).or_default().push(path),
            Err(e) => warn!(file = %path.display(), "skipping: {:#}", e),
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_digest
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(digest, mut files)| {
            files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
            let keep = files.remove(0);
            DuplicateGroup {
                digest,
                keep,
                duplicates: files,
            }
        })
        .collect();
    groups.sort_by(|a, b| a.keep.cmp(&b.keep));
    Ok(groups)
}

/// Delete every duplicate in `groups`, keeping each group's first file.
/// With `dry_run` nothing is touched. Returns how many files were (or would
/// be) removed.
pub fn remove_duplicates(groups: &[DuplicateGroup], dry_run: bool) -> Result<usize> {
    let mut removed = 0;
    for group in groups {
        info!(keep = %group.keep.display(), "duplicate group of {}", group.duplicates.len() + 1);
        for dup in &group.duplicates {
            if dry_run {
                info!(file = %dup.display(), "would delete");
            } else {
                fs::remove_file(dup).with_context(|| format!("deleting {}", dup.display()))?;
                info!(file = %dup.display(), "deleted");
            }
            removed += 1;
        }
    }
    Ok(removed)
}
