//! Crude statement inspection: classification, cache keys and table extraction.
//!
//! None of this parses SQL. Classification looks at the leading keyword only and table
//! extraction takes the first identifier after `FROM`, `INTO` or `UPDATE`.

use super::error::{Result, StashError};
use super::types::{Command, Value};
use serde::Serialize;

const TABLE_KEYWORDS: &[&str] = &["FROM", "INTO", "UPDATE"];

/// Classify a statement by its leading keyword
pub fn classify(statement: &str) -> Command {
    let normalized = statement.trim_start().to_ascii_uppercase();

    if normalized.starts_with("SELECT") {
        Command::Select
    } else if normalized.starts_with("INSERT") {
        Command::Insert
    } else if normalized.starts_with("UPDATE") {
        Command::Update
    } else if normalized.starts_with("DELETE") {
        Command::Delete
    } else {
        Command::Other
    }
}

/// Parameter as written into a cache key. Floats go in by bit pattern because JSON has no
/// spelling for NaN or the infinities.
#[derive(Serialize)]
enum KeyParam<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Value> for KeyParam<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => KeyParam::Null,
            Value::Bool(b) => KeyParam::Bool(*b),
            Value::Int(i) => KeyParam::Int(*i),
            Value::Float(f) => KeyParam::Float(f.to_bits()),
            Value::Text(s) => KeyParam::Text(s),
            Value::Bytes(b) => KeyParam::Bytes(b),
        }
    }
}

/// Cache key for a (statement, parameters) pair.
///
/// The statement text is kept verbatim (apart from surrounding whitespace) so that
/// table-name substring invalidation can match against the key. Distinct parameter lists
/// always give distinct keys.
pub fn cache_key(statement: &str, params: &[Value]) -> Result<String> {
    let params: Vec<KeyParam<'_>> = params.iter().map(KeyParam::from).collect();
    let encoded = serde_json::to_string(&params)
        .map_err(|e| StashError::Codec(format!("cannot encode parameters: {e}")))?;
    Ok(format!("{}{}", statement.trim(), encoded))
}

/// First identifier following `FROM`, `INTO` or `UPDATE`, case-insensitive
pub fn extract_table(statement: &str) -> Option<String> {
    let upper = statement.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    let mut earliest: Option<usize> = None;
    for keyword in TABLE_KEYWORDS {
        let mut from = 0;
        while let Some(pos) = upper[from..].find(keyword) {
            let start = from + pos;
            let end = start + keyword.len();
            let bounded_left = start == 0 || !is_ident_byte(bytes[start - 1]);
            let bounded_right = end < bytes.len() && bytes[end].is_ascii_whitespace();
            if bounded_left && bounded_right {
                earliest = Some(earliest.map_or(end, |e| e.min(end)));
                break;
            }
            from = end;
        }
    }

    let rest = statement[earliest?..].trim_start();
    let ident: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '"' | '`'))
        .filter(|c| !matches!(c, '"' | '`'))
        .collect();

    if ident.is_empty() { None } else { Some(ident) }
}

/// Build one multi-row INSERT with positional placeholders (`$1`, `$2`, ...)
pub fn build_bulk_insert(
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> (String, Vec<Value>) {
    let mut params = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());

    for row in rows {
        let placeholders: Vec<String> = row
            .iter()
            .map(|value| {
                params.push(value.clone());
                format!("${}", params.len())
            })
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let statement = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        tuples.join(", ")
    );
    (statement, params)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
