use chrono::NaiveDate;

use crate::schema::ColumnType;
use crate::store::Value;

/// Turn one CSV cell into a typed value. Anything that does not read as the
/// declared type becomes [`Value::Missing`]; a bad cell never fails the row.
pub fn coerce(raw: &str, ty: ColumnType) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Missing;
    }
    match ty {
        ColumnType::Text => Value::Text(s.to_string()),
        ColumnType::Numeric => parse_number(s).map_or(Value::Missing, Value::Number),
        ColumnType::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_or(Value::Missing, Value::Date),
    }
}

/// Thousands separators are dropped; NaN and infinities are not numbers here.
fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
