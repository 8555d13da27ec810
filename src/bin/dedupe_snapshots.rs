use anyhow::{bail, Result};
use clap::Parser;
use nepseloader::{
    logging,
    snapshot::dedupe::{find_duplicates, remove_duplicates},
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Delete snapshot CSVs whose content repeats an earlier file")]
struct Args {
    /// Directory of snapshot CSVs
    dir: PathBuf,
    /// Report duplicates without deleting them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    logging::init("info");

    let args = Args::parse();
    if !args.dir.is_dir() {
        bail!("{} is not a directory", args.dir.display());
    }

    let groups = find_duplicates(&args.dir)?;
    if groups.is_empty() {
        info!(dir = %args.dir.display(), "no duplicates");
        return Ok(());
    }
    let removed = remove_duplicates(&groups, args.dry_run)?;
    info!(groups = groups.len(), removed, dry_run = args.dry_run, "dedupe finished");
    Ok(())
}
