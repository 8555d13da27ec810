use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::{io::Read, path::Path};
use tracing::{debug, warn};

use super::coerce::coerce;
use crate::schema::{normalize_header, CanonicalSchema};
use crate::store::Value;

/// Cell text the scrapers write when the source had nothing for the day.
pub fn default_sentinels() -> Vec<String> {
    vec![
        "no record found.".to_string(),
        "no record found".to_string(),
        "no data found".to_string(),
        "no data found.".to_string(),
    ]
}

/// Parsed body of one snapshot file.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotContent {
    /// Coerced rows aligned with the canonical columns.
    Rows {
        rows: Vec<Vec<Value>>,
        skipped_rows: usize,
    },
    /// The only data row was a "no record found" marker.
    Sentinel,
    /// No header, or no row with an identity value.
    Empty,
}

/// Where each canonical column is read from in one file's header, if at all.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMap {
    sources: Vec<Option<usize>>,
}

impl HeaderMap {
    pub fn build(headers: &StringRecord, schema: &CanonicalSchema) -> Self {
        let mut sources = vec![None; schema.columns.len()];
        for (i, label) in headers.iter().enumerate() {
            let name = normalize_header(label);
            match schema.position(&name) {
                Some(pos) if sources[pos].is_none() => sources[pos] = Some(i),
                Some(_) => warn!(label, column = %name, "duplicate header; keeping the first"),
                None => debug!(label, column = %name, "header not in canonical set; dropped"),
            }
        }
        Self { sources }
    }

    pub fn source(&self, canonical: usize) -> Option<usize> {
        self.sources.get(canonical).copied().flatten()
    }

    pub(crate) fn mapped(&self) -> usize {
        self.sources.iter().filter(|s| s.is_some()).count()
    }
}

fn is_sentinel(record: &StringRecord, sentinels: &[String]) -> bool {
    record.iter().any(|cell| {
        let cell = cell.trim().to_lowercase();
        !cell.is_empty() && sentinels.iter().any(|s| s.eq_ignore_ascii_case(&cell))
    })
}

/// Read a snapshot from any reader: header row, then data rows.
pub fn read_snapshot<R: Read>(
    input: R,
    schema: &CanonicalSchema,
    sentinels: &[String],
) -> Result<SnapshotContent> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers = rdr.headers().context("reading header row")?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(SnapshotContent::Empty);
    }
    let map = HeaderMap::build(&headers, schema);
    debug!(mapped = map.mapped(), canonical = schema.columns.len(), "header mapped");

    let records = rdr
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("reading data rows")?;

    if records.len() == 1 && is_sentinel(&records[0], sentinels) {
        return Ok(SnapshotContent::Sentinel);
    }

    let Some(identity) = schema.identity_index() else {
        return Ok(SnapshotContent::Empty);
    };
    if map.source(identity).is_none() {
        warn!(column = %schema.identity, "no header maps to the identity column");
        return Ok(SnapshotContent::Empty);
    }

    let mut rows = Vec::with_capacity(records.len());
    let mut skipped_rows = 0;
    for record in &records {
        let cell = |canonical: usize| map.source(canonical).and_then(|i| record.get(i));
        if cell(identity).map_or(true, |s| s.trim().is_empty()) {
            skipped_rows += 1;
            continue;
        }
        let row = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| coerce(cell(i).unwrap_or(""), col.ty))
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Ok(SnapshotContent::Empty);
    }
    Ok(SnapshotContent::Rows { rows, skipped_rows })
}

/// Open `path` and read it as a snapshot.
pub fn read_snapshot_file(
    path: &Path,
    schema: &CanonicalSchema,
    sentinels: &[String],
) -> Result<SnapshotContent> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_snapshot(file, schema, sentinels).with_context(|| format!("reading {}", path.display()))
}
