//! Backend collaborator: the SQL transport the dispatcher executes against.
//!
//! [`Connector`] opens a [`Backend`] for a registered connection the first
//! time the connection is used. The crate ships a MySQL implementation in
//! [`crate::mysql`]; tests script their own.

use std::future::Future;

use crate::error::{RapidError, RapidResult};
use crate::registry::ConnectionConfig;
use crate::value::{Params, Value};

/// A fetched row: column name → value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Opens backends and quotes scalars for inline use.
pub trait Connector {
    type Backend: Backend;

    /// Open a connection for `config`.
    fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> impl Future<Output = RapidResult<Self::Backend>> + Send;

    /// Quote a scalar for inlining into SQL (row selector injection).
    fn quote(&self, value: &str) -> String {
        quote_literal(value)
    }
}

/// One open backend connection.
pub trait Backend: Send {
    /// Run a statement that returns rows.
    fn fetch(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> impl Future<Output = RapidResult<Vec<Row>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> impl Future<Output = RapidResult<u64>> + Send;

    /// Id generated by the last INSERT on this connection.
    fn last_insert_id(&mut self) -> impl Future<Output = RapidResult<u64>> + Send;

    fn begin(&mut self) -> impl Future<Output = RapidResult<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = RapidResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = RapidResult<()>> + Send;
}

/// Quote a scalar as a MySQL literal. Integers are left bare.
pub fn quote_literal(value: &str) -> String {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Rewrite `:name` placeholders to positional `?` and collect the bound
/// values in placeholder order. Text inside quotes and `::` are left alone.
///
/// Positional params pass through unchanged.
pub fn bind_named(sql: &str, params: &Params) -> RapidResult<(String, Vec<Value>)> {
    params.ensure_bindable()?;
    let record = match params {
        Params::None => return Ok((sql.to_string(), Vec::new())),
        Params::Positional(values) => return Ok((sql.to_string(), values.clone())),
        Params::Named(record) => record,
    };

    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ':' if is_placeholder_start(&chars, i) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = record
                    .get(&name)
                    .ok_or_else(|| RapidError::MissingParam(name.clone()))?;
                values.push(value.clone());
                out.push('?');
                i = end;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, values))
}

fn is_placeholder_start(chars: &[char], i: usize) -> bool {
    let prev_ok = i == 0 || chars[i - 1] != ':';
    let next_ok = chars
        .get(i + 1)
        .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_');
    let not_cast = chars.get(i + 1) != Some(&':');
    prev_ok && next_ok && not_cast
}
