use std::collections::HashMap;
use std::fmt;

use crate::error::GraphMigError;

/// A value read from (or bound into) a graph query.
///
/// This mirrors the small slice of the Bolt type system the planner
/// needs; driver adapters convert their own value types into this one.
#[derive(Clone, Debug, PartialEq)]
pub enum CypherValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<CypherValue>),
}

impl CypherValue {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            CypherValue::Null => "null",
            CypherValue::Bool(_) => "boolean",
            CypherValue::Integer(_) => "integer",
            CypherValue::Float(_) => "float",
            CypherValue::String(_) => "string",
            CypherValue::List(_) => "list",
        }
    }
}

impl fmt::Display for CypherValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CypherValue::Null => f.write_str("null"),
            CypherValue::Bool(b) => write!(f, "{b}"),
            CypherValue::Integer(i) => write!(f, "{i}"),
            CypherValue::Float(v) => write!(f, "{v}"),
            CypherValue::String(s) => f.write_str(s),
            CypherValue::List(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for CypherValue {
    fn from(value: bool) -> Self {
        CypherValue::Bool(value)
    }
}

impl From<i64> for CypherValue {
    fn from(value: i64) -> Self {
        CypherValue::Integer(value)
    }
}

impl From<f64> for CypherValue {
    fn from(value: f64) -> Self {
        CypherValue::Float(value)
    }
}

impl From<&str> for CypherValue {
    fn from(value: &str) -> Self {
        CypherValue::String(value.to_string())
    }
}

impl From<String> for CypherValue {
    fn from(value: String) -> Self {
        CypherValue::String(value)
    }
}

impl<T: Into<CypherValue>> From<Vec<T>> for CypherValue {
    fn from(values: Vec<T>) -> Self {
        CypherValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// One result row, fields keyed by the names of the query's RETURN
/// clause.
#[derive(Clone, Debug, Default)]
pub struct Row {
    values: HashMap<String, CypherValue>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    /// Builder-style insertion, convenient for driver adapters and
    /// tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<CypherValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<CypherValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&CypherValue> {
        self.values.get(key)
    }
}

/// Read-transaction capability the database model reader consumes.
///
/// Implementations run the query inside a single logical read
/// transaction and return all rows. The planner never depends on a
/// concrete driver; a thin adapter over the driver's session type is
/// all an embedder needs to provide.
pub trait ReadSession {
    fn execute_read(
        &mut self,
        query: &str,
        params: &[(&str, CypherValue)],
    ) -> Result<Vec<Row>, GraphMigError>;
}
