//! Result decoration.
//!
//! Templates use `{$name}` placeholders:
//!
//! | Placeholder | Replaced by |
//! |---|---|
//! | `{$name}` | the row's `name` field |
//! | `{$name:filter}` | `filter` applied to the field |
//! | `{$name:yes?:no}` | `yes` when the field is truthy, else `no` |
//! | `{$:filter}` | `filter` applied to the whole row |
//! | `{$:key}` | the row index |
//!
//! Placeholders that cannot be resolved are left in place.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\$(\w+)?(?::([^}]+))?\}").expect("valid regex"));

const ROW_KEY: &str = "{$:key}";
const TEST_SEPARATOR: &str = "?:";

/// A named filter applied to a field or a whole row.
pub type Filter = Arc<dyn Fn(&JsonValue) -> String + Send + Sync>;

/// Filter name → filter.
#[derive(Clone, Default)]
pub struct Filters(HashMap<String, Filter>);

impl Filters {
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        filter: impl Fn(&JsonValue) -> String + Send + Sync + 'static,
    ) {
        self.0.insert(name.into(), Arc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Filters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// A template with its filters.
#[derive(Debug, Clone, Default)]
pub struct Decorator {
    pub template: String,
    pub filters: Filters,
}

impl Decorator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            filters: Filters::default(),
        }
    }

    pub fn filter(
        mut self,
        name: impl Into<String>,
        filter: impl Fn(&JsonValue) -> String + Send + Sync + 'static,
    ) -> Self {
        self.filters.insert(name, filter);
        self
    }

    pub fn data(&self, rows: &JsonValue) -> String {
        data(rows, &self.template, &self.filters)
    }

    pub fn string(&self, value: &JsonValue) -> String {
        string(value, &self.template, &self.filters)
    }

    pub fn test(&self, value: &JsonValue) -> String {
        test(value, &self.template)
    }

    /// Whether the template has a `yes ?: no` branch.
    pub fn is_test(&self) -> bool {
        self.template.contains(TEST_SEPARATOR)
    }
}

/// Render the template once per row and concatenate.
///
/// `rows` is an array of rows, or a single row. A row is an object (fields by
/// name) or an array (fields by position).
pub fn data(rows: &JsonValue, template: &str, filters: &Filters) -> String {
    match rows {
        JsonValue::Array(items) if items.iter().all(is_row) => items
            .iter()
            .enumerate()
            .map(|(i, row)| decorate_row(row, template, filters, i))
            .collect(),
        row if is_row(row) => decorate_row(row, template, filters, 0),
        _ => String::new(),
    }
}

/// Render a single scalar: `{$}` or `{$anything}` becomes the value,
/// `{$:filter}` the filtered value.
pub fn string(value: &JsonValue, template: &str, filters: &Filters) -> String {
    if !is_scalar(value) {
        return template.to_string();
    }
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match caps.get(2) {
            Some(name) => match filters.get(name.as_str()) {
                Some(filter) => filter(value),
                None => caps[0].to_string(),
            },
            None => scalar_text(value),
        })
        .into_owned()
}

/// `yes?:no` → `yes` when `value` is truthy, else `no`, both trimmed.
/// A template without the separator is returned unchanged.
pub fn test(value: &JsonValue, template: &str) -> String {
    match template.split_once(TEST_SEPARATOR) {
        Some((yes, _)) if is_truthy(value) => yes.trim().to_string(),
        Some((_, no)) => no.trim().to_string(),
        None => template.to_string(),
    }
}

fn decorate_row(row: &JsonValue, template: &str, filters: &Filters, index: usize) -> String {
    let out = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| {
        let whole = &caps[0];
        let spec = caps.get(2).map(|m| m.as_str());
        match (caps.get(1), spec) {
            (None, Some(name)) => match filters.get(name) {
                Some(filter) => filter(row),
                None => whole.to_string(),
            },
            (None, None) => whole.to_string(),
            (Some(field), spec) => match field_of(row, field.as_str()) {
                Some(value) if is_scalar(value) => match spec {
                    Some(spec) if spec.contains(TEST_SEPARATOR) => test(value, spec),
                    Some(name) => match filters.get(name) {
                        Some(filter) => filter(value),
                        None => whole.to_string(),
                    },
                    None => scalar_text(value),
                },
                _ => whole.to_string(),
            },
        }
    });
    out.replace(ROW_KEY, &index.to_string())
}

fn field_of<'a>(row: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    match row {
        JsonValue::Object(map) => map.get(name),
        JsonValue::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn is_row(value: &JsonValue) -> bool {
    matches!(value, JsonValue::Object(_) | JsonValue::Array(_))
}

fn is_scalar(value: &JsonValue) -> bool {
    !is_row(value)
}

/// Text of a scalar: booleans render as `1` / empty, null as empty.
pub fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null | JsonValue::Bool(false) => String::new(),
        JsonValue::Bool(true) => "1".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Null, false, zero, `""` and `"0"` and empty collections are falsy.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !(s.is_empty() || s == "0"),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}
