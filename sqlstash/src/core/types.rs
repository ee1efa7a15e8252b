use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar value carried in statement parameters and result rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Statement class, also reported as the command of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Command {
    Select,
    Insert,
    Update,
    Delete,
    #[default]
    Other,
}

impl Command {
    /// Whether statements of this class are deferred through the write queue
    pub fn is_write(self) -> bool {
        matches!(self, Command::Insert | Command::Update | Command::Delete)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Select => "SELECT",
            Command::Insert => "INSERT",
            Command::Update => "UPDATE",
            Command::Delete => "DELETE",
            Command::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Column description of a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Database type name as reported by the executor
    pub type_name: String,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One result row: columns in select-list order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, keeping insertion order
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }

    /// Look up a column by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Result of one executed statement
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub command: Command,
    /// Rows returned or affected
    pub row_count: u64,
    pub fields: Vec<Field>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// Result for a statement that returned rows
    pub fn with_rows(command: Command, fields: Vec<Field>, rows: Vec<Row>) -> Self {
        Self {
            command,
            row_count: rows.len() as u64,
            fields,
            rows,
        }
    }

    /// Result for a statement that only reports an affected-row count
    pub fn affected(command: Command, row_count: u64) -> Self {
        Self {
            command,
            row_count,
            ..Default::default()
        }
    }

    /// Placeholder returned for a write that was queued, not executed.
    ///
    /// The zero row count says nothing about the eventual outcome; callers that need the
    /// real count must run the write in immediate mode.
    pub fn queued(command: Command) -> Self {
        Self::affected(command, 0)
    }
}

/// Per-call routing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// `Some(false)` bypasses the cache for this read; `None` follows the pool setting
    pub cache: Option<bool>,
    /// Execute writes synchronously and return the real result
    pub immediate: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn no_cache(self) -> Self {
        self.with_cache(false)
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Outcome of a bulk insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BulkInsertResult {
    pub row_count: u64,
    /// Number of INSERT statements issued
    pub statements: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_keeps_order() {
        let row = Row::new().with("id", 7).with("name", "alice").with("nick", None::<&str>);

        assert_eq!(row.len(), 3);
        assert_eq!(row.get("name"), Some(&Value::Text("alice".to_string())));
        assert_eq!(row.get("nick"), Some(&Value::Null));
        assert_eq!(row.get("missing"), None);

        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "name", "nick"]);
    }

    #[test]
    fn test_queued_placeholder() {
        let result = QueryResult::queued(Command::Update);
        assert_eq!(result.command, Command::Update);
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_with_rows_counts_rows() {
        let rows = vec![Row::new().with("n", 1), Row::new().with("n", 2)];
        let result = QueryResult::with_rows(Command::Select, vec![Field::new("n", "int8")], rows);
        assert_eq!(result.row_count, 2);
    }

    #[test]
    fn test_query_options_builder() {
        let opts = QueryOptions::new().no_cache().immediate();
        assert_eq!(opts.cache, Some(false));
        assert!(opts.immediate);
        assert_eq!(QueryOptions::default().cache, None);
    }
}
