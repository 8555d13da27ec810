pub mod normalize;
pub mod reconcile;
pub mod types;

pub use normalize::normalize_header;
pub use reconcile::{ensure_schema, plan_schema, SchemaChange};
pub use types::{CanonicalSchema, Column, ColumnType, DATE_COLUMN, ID_COLUMN};
