//! Maps raw CSV header labels onto canonical column names.
//!
//! Lookup is a single ordered alias table. A label is first compared as-is
//! (case-insensitive, whitespace collapsed); if that misses, it is reduced
//! to identifier shape and compared again, and whatever survives the
//! reduction is the column name.

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder for labels that reduce to nothing.
pub const PLACEHOLDER: &str = "col";

/// Postgres truncates identifiers past this many bytes.
const MAX_IDENT_LEN: usize = 63;

/// `(pattern, canonical)` pairs. Literal variants come first, then the
/// identifier-shaped forms the fallback transform produces for headers
/// whose reduction alone would not land on the canonical name.
static HEADER_ALIASES: &[(&str, &str)] = &[
    // literal variants
    ("conf.", "conf"),
    ("prev. close", "prev_close"),
    ("trans.", "trans"),
    ("close - ltp", "close_minus_ltp"),
    ("close-ltp", "close_minus_ltp"),
    ("close - ltp %", "close_minus_ltp_pct"),
    ("close-ltp %", "close_minus_ltp_pct"),
    ("close - ltp%", "close_minus_ltp_pct"),
    ("close-ltp%", "close_minus_ltp_pct"),
    ("diff %", "diff_pct"),
    ("diff%", "diff_pct"),
    ("diff percent", "diff_pct"),
    ("diff percentage", "diff_pct"),
    ("range %", "range_pct"),
    ("range%", "range_pct"),
    ("range percent", "range_pct"),
    ("range percentage", "range_pct"),
    ("vwap %", "vwap_pct"),
    ("vwap%", "vwap_pct"),
    ("vwap percent", "vwap_pct"),
    ("vwap percentage", "vwap_pct"),
    ("52 weeks high", "weeks_52_high"),
    ("52weeks high", "weeks_52_high"),
    ("52 week high", "weeks_52_high"),
    ("52week high", "weeks_52_high"),
    ("52 weeks low", "weeks_52_low"),
    ("52weeks low", "weeks_52_low"),
    ("52 week low", "weeks_52_low"),
    ("52week low", "weeks_52_low"),
    // reduced forms
    ("close_ltp", "close_minus_ltp"),
    ("closeltp", "close_minus_ltp"),
    ("close_ltp_pct", "close_minus_ltp_pct"),
    ("closeltp_pct", "close_minus_ltp_pct"),
    ("diff_percent", "diff_pct"),
    ("diff_percentage", "diff_pct"),
    ("range_percent", "range_pct"),
    ("range_percentage", "range_pct"),
    ("vwap_percent", "vwap_pct"),
    ("vwap_percentage", "vwap_pct"),
    ("52_weeks_high", "weeks_52_high"),
    ("52weeks_high", "weeks_52_high"),
    ("52_week_high", "weeks_52_high"),
    ("52week_high", "weeks_52_high"),
    ("52_weeks_low", "weeks_52_low"),
    ("52weeks_low", "weeks_52_low"),
    ("52_week_low", "weeks_52_low"),
    ("52week_low", "weeks_52_low"),
    ("prevclose", "prev_close"),
    ("s_no", "sno"),
];

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s]").expect("static regex"));
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("static regex"));

fn lookup(key: &str) -> Option<&'static str> {
    HEADER_ALIASES
        .iter()
        .find(|(pattern, _)| *pattern == key)
        .map(|(_, canonical)| *canonical)
}

/// Lowercased label with surrounding whitespace dropped and inner runs of
/// whitespace reduced to one space.
fn literal_key(label: &str) -> String {
    label
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identifier-shaped reduction of a label: `%` reads as `pct`, anything that
/// is not ASCII alphanumeric, `_` or whitespace is dropped, whitespace runs
/// become `_`.
fn reduce(label: &str) -> String {
    let lowered = label.to_lowercase().replace('%', " pct ");
    let stripped = NON_WORD.replace_all(&lowered, "");
    let joined = stripped.split_whitespace().collect::<Vec<_>>().join("_");
    UNDERSCORES.replace_all(&joined, "_").into_owned()
}

/// Map a raw header label to its canonical column name.
///
/// Total: every input, the empty string included, yields a non-empty
/// `[a-z_][a-z0-9_]*` identifier of at most 63 bytes, and applying it to
/// its own output changes nothing.
pub fn normalize_header(label: &str) -> String {
    if let Some(canonical) = lookup(&literal_key(label)) {
        return canonical.to_string();
    }

    let mut name = reduce(label);
    if let Some(canonical) = lookup(&name) {
        return canonical.to_string();
    }

    if name.is_empty() {
        return PLACEHOLDER.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    // ASCII only at this point, so any byte index is a char boundary
    name.truncate(MAX_IDENT_LEN);
    name
}
