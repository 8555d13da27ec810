// src/history/mod.rs

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Holding directory for snapshot files that have been consumed. A file's
/// presence here is the completion marker; the importer never reads from it.
pub struct ProcessedFiles {
    dir: PathBuf,
}

impl ProcessedFiles {
    /// Construct at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating processed directory {:?}", &dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `file` into the holding directory under its own name, replacing
    /// any earlier file of that name. Falls back to copy + delete when a
    /// plain rename is not possible (different filesystem).
    pub fn mark(&self, file: &Path) -> Result<PathBuf> {
        let name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?;
        let target = self.dir.join(name);

        if fs::rename(file, &target).is_err() {
            fs::copy(file, &target).with_context(|| {
                format!("copying {} to {}", file.display(), target.display())
            })?;
            fs::remove_file(file).with_context(|| format!("removing {}", file.display()))?;
        }
        debug!(from = %file.display(), to = %target.display(), "moved to processed");
        Ok(target)
    }

    /// Returns `true` if a file named `file_name` has already been moved here.
    pub fn contains(&self, file_name: &str) -> bool {
        self.dir.join(file_name).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mark_moves_file() -> Result<()> {
        let tmp = tempdir()?;
        let src = tmp.path().join("2024_01_10.csv");
        fs::write(&src, "Symbol\nNABIL\n")?;

        let processed = ProcessedFiles::new(tmp.path().join("processed"))?;
        assert!(!processed.contains("2024_01_10.csv"));

        let target = processed.mark(&src)?;
        assert!(!src.exists());
        assert!(processed.contains("2024_01_10.csv"));
        assert_eq!(fs::read_to_string(target)?, "Symbol\nNABIL\n");
        Ok(())
    }

    #[test]
    fn test_mark_replaces_earlier_copy() -> Result<()> {
        let tmp = tempdir()?;
        let processed = ProcessedFiles::new(tmp.path().join("processed"))?;
        fs::write(processed.dir().join("2024_01_10.csv"), "old")?;

        let src = tmp.path().join("2024_01_10.csv");
        fs::write(&src, "new")?;
        processed.mark(&src)?;
        assert_eq!(
            fs::read_to_string(processed.dir().join("2024_01_10.csv"))?,
            "new"
        );
        Ok(())
    }
}
