//! Schema reconciliation: bring a live table in line with the canonical
//! column set.
//!
//! Reconciliation is split into a pure planning step, which compares the
//! table's current columns against the canonical set, and an apply step that
//! renders each change as DDL for the store's dialect. A table that already
//! matches produces an empty plan, so running it before every import is
//! cheap and changes nothing.

use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, info, warn};

use super::types::{CanonicalSchema, Column, ColumnType, DATE_COLUMN, ID_COLUMN};
use crate::store::{quote_ident, Dialect, TableStore};

/// One schema change the reconciler decided on.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateTable { columns: Vec<Column> },
    RenameColumn { from: String, to: String },
    AddColumn(Column),
    DropColumn(String),
}

impl SchemaChange {
    /// DDL for this change against `table`.
    pub fn to_sql(&self, table: &str, dialect: Dialect) -> String {
        let t = quote_ident(table);
        match self {
            SchemaChange::CreateTable { columns } => {
                let mut defs = Vec::with_capacity(columns.len() + 2);
                defs.push(dialect.identity_column(ID_COLUMN));
                defs.push(format!(
                    "{} {}",
                    quote_ident(DATE_COLUMN),
                    dialect.type_name(ColumnType::Date)
                ));
                for c in columns {
                    defs.push(format!("{} {}", quote_ident(&c.name), dialect.type_name(c.ty)));
                }
                format!("CREATE TABLE {} ({})", t, defs.join(", "))
            }
            SchemaChange::RenameColumn { from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                t,
                quote_ident(from),
                quote_ident(to)
            ),
            SchemaChange::AddColumn(c) => format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                t,
                quote_ident(&c.name),
                dialect.type_name(c.ty)
            ),
            SchemaChange::DropColumn(name) => {
                format!("ALTER TABLE {} DROP COLUMN {}", t, quote_ident(name))
            }
        }
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::CreateTable { columns } => {
                write!(f, "create table with {} columns", columns.len() + 2)
            }
            SchemaChange::RenameColumn { from, to } => write!(f, "rename {} -> {}", from, to),
            SchemaChange::AddColumn(c) => write!(f, "add {} ({:?})", c.name, c.ty),
            SchemaChange::DropColumn(name) => write!(f, "drop {}", name),
        }
    }
}

/// Work out the changes that take a table with `existing` columns (or no
/// table at all) to the canonical layout.
///
/// `existing` holds the names exactly as stored. Matching is
/// case-insensitive, but every emitted change names the stored spelling so
/// the DDL is valid on backends where quoted identifiers keep their case.
/// A canonical column stored under another case is renamed to the
/// canonical spelling.
///
/// Order matters: legacy renames run first so their data is kept, then
/// case fixes, then missing canonical columns are added, then leftovers are
/// dropped. `id` is never added after the fact; a table without it is left
/// keyless.
pub fn plan_schema(existing: Option<&[String]>, schema: &CanonicalSchema) -> Vec<SchemaChange> {
    let Some(existing) = existing else {
        return vec![SchemaChange::CreateTable {
            columns: schema.columns.clone(),
        }];
    };

    let mut current: Vec<String> = existing.to_vec();
    let mut changes = Vec::new();

    for (old, new) in &schema.legacy_renames {
        if schema.position(new).is_none() || find_column(&current, new).is_some() {
            continue;
        }
        if let Some(i) = find_column(&current, old) {
            changes.push(SchemaChange::RenameColumn {
                from: current[i].clone(),
                to: new.clone(),
            });
            current[i] = new.clone();
        }
    }

    let expected = schema.table_column_names();
    for name in &expected {
        if current.contains(name) {
            continue;
        }
        if let Some(i) = find_column(&current, name) {
            changes.push(SchemaChange::RenameColumn {
                from: current[i].clone(),
                to: name.clone(),
            });
            current[i] = name.clone();
        }
    }

    if !current.iter().any(|c| c == DATE_COLUMN) {
        changes.push(SchemaChange::AddColumn(Column::new(
            DATE_COLUMN,
            ColumnType::Date,
        )));
    }
    for col in &schema.columns {
        if !current.contains(&col.name) {
            changes.push(SchemaChange::AddColumn(col.clone()));
        }
    }

    for c in &current {
        if !expected.contains(c) {
            changes.push(SchemaChange::DropColumn(c.clone()));
        }
    }

    changes
}

/// Position of the first column equal to `name` ignoring case, preferring
/// an exact match.
fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
}

/// Reconcile `table` against `schema` and return the changes that were
/// applied. Also makes sure the per-date index exists.
///
/// Runs inside whatever transaction the caller has open.
pub fn ensure_schema<S: TableStore + ?Sized>(
    store: &mut S,
    table: &str,
    schema: &CanonicalSchema,
) -> Result<Vec<SchemaChange>> {
    let existing = if store.table_exists(table)? {
        Some(store.column_names(table)?)
    } else {
        None
    };

    if let Some(cols) = &existing {
        if find_column(cols, ID_COLUMN).is_none() {
            warn!(table, "table has no `{}` column; leaving it keyless", ID_COLUMN);
        }
    }

    let changes = plan_schema(existing.as_deref(), schema);
    let dialect = store.dialect();
    for change in &changes {
        info!(table, "schema: {}", change);
        let sql = change.to_sql(table, dialect);
        debug!(sql = %sql, "applying schema change");
        store
            .execute(&sql)
            .with_context(|| format!("applying `{}` to {}", change, table))?;
    }

    store.execute(&format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(&format!("{}_date_idx", table)),
        quote_ident(table),
        quote_ident(DATE_COLUMN)
    ))?;

    Ok(changes)
}
