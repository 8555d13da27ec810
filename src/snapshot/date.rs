use chrono::NaiveDate;
use std::path::Path;

const FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y_%m_%d"];

/// Recover the snapshot date from a filename such as `2024_03_15.csv`,
/// `2024-03-15.csv` or `20240315.csv`.
///
/// Only the file stem is looked at, and it must be the date and nothing
/// else. Returns `None` rather than an error when no format matches.
pub fn parse_date_from_filename(filename: impl AsRef<Path>) -> Option<NaiveDate> {
    let stem = filename.as_ref().file_stem()?.to_str()?.trim();
    let candidates = [stem.replace('_', "-"), stem.replace('-', "_"), stem.to_string()];

    candidates.iter().find_map(|c| {
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(c, fmt).ok())
    })
}
