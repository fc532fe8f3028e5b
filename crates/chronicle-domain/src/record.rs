//! Query parameters and result records exchanged with the graph store

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named query parameters (`:name` in query text)
pub type Params = Map<String, Value>;

/// One result row, keyed by column alias
pub type Record = Map<String, Value>;

/// Rows returned by a single query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Result rows in store order
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Wrap a list of records
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Whether the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// First row, if any
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Iterate over rows
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Typed accessors over a [`Record`]
pub trait RecordExt {
    /// String column; `None` when missing, null or not a string
    fn str_field(&self, key: &str) -> Option<&str>;

    /// Integer column
    fn i64_field(&self, key: &str) -> Option<i64>;

    /// JSON column stored as text, parsed; `Value::Null` when absent or invalid
    fn json_field(&self, key: &str) -> Value;
}

impl RecordExt for Record {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn i64_field(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn json_field(&self, key: &str) -> Value {
        match self.get(key) {
            Some(Value::String(text)) => serde_json::from_str(text).unwrap_or(Value::Null),
            Some(other) => other.clone(),
            None => Value::Null,
        }
    }
}

/// Build a [`Params`] map from `key => value` pairs
///
/// ```
/// use chronicle_domain::params;
///
/// let p = params! { "id" => "f1", "limit" => 10 };
/// assert_eq!(p["limit"], 10);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Params::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )+
        map
    }};
}
