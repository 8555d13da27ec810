use anyhow::{Context, Result};
use clap::Parser;
use nepseloader::{
    config::{DatabaseConfig, ImporterConfig},
    import::{Importer, RunSummary},
    logging, open_store,
};
use std::{fs, path::PathBuf, time::Instant};
use tracing::{error, info};

/// Load dated ShareSansar snapshot CSVs into the historic price table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config file; defaults apply to anything it leaves out
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of dated snapshot CSVs
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Write to this SQLite file instead of the configured database
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Move consumed files into the processed directory
    #[arg(long)]
    move_processed: bool,

    /// Import just this file, ignoring cutoff and run order
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Write the run summary here as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init("info");

    let args = Args::parse();
    let mut cfg = ImporterConfig::load(args.config.as_deref())?;
    if let Some(src) = args.source {
        cfg.source_dir = src;
    }
    if let Some(path) = args.sqlite {
        cfg.database = DatabaseConfig::Sqlite { path };
    }
    if args.move_processed {
        cfg.move_processed = true;
    }

    let start = Instant::now();
    let store = open_store(&cfg.database)?;
    let source_dir = cfg.source_dir.clone();
    let mut importer = Importer::new(store, cfg)?;

    let summary = match args.file {
        Some(file) => {
            let outcome = importer.import_file(&file)?;
            info!(file = %file.display(), "{}", outcome);
            let mut summary = RunSummary::new();
            summary.record(file, outcome);
            summary
        }
        None => {
            info!(dir = %source_dir.display(), "starting run");
            importer.run(&source_dir)?
        }
    };

    if let Some(out) = args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
    }

    if summary.failed_files > 0 {
        error!(failed = summary.failed_files, "some files failed and were rolled back");
    }
    info!(
        files = summary.imported_files,
        rows = summary.imported_rows,
        elapsed = ?start.elapsed(),
        "done"
    );
    Ok(())
}
