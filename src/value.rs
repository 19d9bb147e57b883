//! Values bound to statements.

use serde::{Deserialize, Serialize};

use crate::error::{RapidError, RapidResult};

/// A value supplied by the caller for a column or a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Text(String),
    /// Trusted SQL fragment, inlined unescaped into INSERT/UPDATE/CALL.
    ///
    /// Never parameterized: whatever is in here reaches the server verbatim.
    /// Use it for expressions such as `NOW()`, never for caller input.
    Raw(String),
}

impl Value {
    /// Construct a raw SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Value::Raw(sql.into())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Value::Raw(_))
    }

    /// Integer view of the value; text is parsed, floats are truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view used when concatenating values into a cache key or log line.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) | Value::Raw(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Raw(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.as_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::Value::from(n),
            Value::Float(f) => serde_json::Value::from(f),
            Value::Text(s) | Value::Raw(s) => serde_json::Value::String(s),
        }
    }
}

/// Ordered column → value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record(Vec<(String, Value)>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an existing one with the same name in place.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; fields of `other` win.
    pub fn merge(&mut self, other: &Record) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Parameters of one statement: named (`:name`) or positional (`?`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Params {
    #[default]
    None,
    Named(Record),
    Positional(Vec<Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Named(r) => r.is_empty(),
            Params::Positional(v) => v.is_empty(),
        }
    }

    /// The keyed record behind these params, if they are named.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Params::Named(r) => Some(r),
            _ => None,
        }
    }

    /// Values in the order they were supplied.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Params::None => Vec::new(),
            Params::Named(r) => r.iter().map(|(_, v)| v).collect(),
            Params::Positional(v) => v.iter().collect(),
        }
    }

    /// Reject raw SQL fragments, which must never be bound.
    pub fn ensure_bindable(&self) -> RapidResult<()> {
        match self {
            Params::None => Ok(()),
            Params::Named(r) => match r.iter().find(|(_, v)| v.is_raw()) {
                Some((k, _)) => Err(RapidError::InvalidParam(k.to_string())),
                None => Ok(()),
            },
            Params::Positional(v) => match v.iter().position(Value::is_raw) {
                Some(i) => Err(RapidError::InvalidParam(i.to_string())),
                None => Ok(()),
            },
        }
    }

    /// `name => value` pairs for the debug log.
    pub fn describe(&self) -> String {
        match self {
            Params::None => String::new(),
            Params::Named(r) => r
                .iter()
                .map(|(k, v)| format!("{} => {}", k, v))
                .collect::<Vec<_>>()
                .join(", "),
            Params::Positional(v) => v
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{} => {}", i, v))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<Record> for Params {
    fn from(r: Record) -> Self {
        Params::Named(r)
    }
}

impl From<Vec<Value>> for Params {
    fn from(v: Vec<Value>) -> Self {
        Params::Positional(v)
    }
}
