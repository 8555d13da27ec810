// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// Declared storage type of a canonical column.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Numeric,
    Date,
}

/// A single canonical column: the name the table uses and its declared type.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Generated identity key every target table carries.
pub const ID_COLUMN: &str = "id";

/// Column holding the snapshot date every row is tagged with.
pub const DATE_COLUMN: &str = "date";

/// The ShareSansar price table layout, in table order.
pub fn default_columns() -> Vec<Column> {
    const NUMERIC: &[&str] = &[
        "conf",
        "open",
        "high",
        "low",
        "close",
        "ltp",
        "close_minus_ltp",
        "close_minus_ltp_pct",
        "vwap",
        "vol",
        "prev_close",
        "turnover",
        "trans",
        "diff",
        "range",
        "diff_pct",
        "range_pct",
        "vwap_pct",
        "weeks_52_high",
        "weeks_52_low",
    ];

    let mut cols = Vec::with_capacity(NUMERIC.len() + 1);
    cols.push(Column::new("symbol", ColumnType::Text));
    cols.extend(NUMERIC.iter().map(|n| Column::new(n, ColumnType::Numeric)));
    cols
}

/// Old column names that earlier versions of the table used.
pub fn default_legacy_renames() -> Vec<(String, String)> {
    vec![
        ("close_ltp".to_string(), "close_minus_ltp".to_string()),
        ("close_ltp_pct".to_string(), "close_minus_ltp_pct".to_string()),
    ]
}

/// Canonical layout of a target table: the ordered data columns plus the
/// column that identifies a security within one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSchema {
    pub columns: Vec<Column>,
    pub identity: String,
    pub legacy_renames: Vec<(String, String)>,
}

impl CanonicalSchema {
    pub fn new(
        columns: Vec<Column>,
        identity: impl Into<String>,
        legacy_renames: Vec<(String, String)>,
    ) -> Self {
        Self {
            columns,
            identity: identity.into(),
            legacy_renames,
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn identity_index(&self) -> Option<usize> {
        self.position(&self.identity)
    }

    /// Every column the physical table should hold, in table order:
    /// `id`, `date`, then the canonical columns.
    pub fn table_column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.columns.len() + 2);
        names.push(ID_COLUMN.to_string());
        names.push(DATE_COLUMN.to_string());
        names.extend(self.columns.iter().map(|c| c.name.clone()));
        names
    }
}

impl Default for CanonicalSchema {
    fn default() -> Self {
        Self::new(default_columns(), "symbol", default_legacy_renames())
    }
}
