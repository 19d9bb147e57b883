//! Pagination state and calculator.
//!
//! A paginated query fetches `rpp + 1` rows; the extra lookahead row only
//! signals that a next page exists and is dropped before returning.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{RapidError, RapidResult};
use crate::value::{Record, Value};

static LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIMIT\s+[\d,]+").expect("valid regex"));

/// Whether `sql` already carries a LIMIT clause.
///
/// Also matches `LIMIT` inside string literals or subqueries.
pub fn has_limit(sql: &str) -> bool {
    LIMIT_RE.is_match(sql)
}

/// Append a LIMIT clause, dropping a trailing `;`.
pub fn append_limit(sql: &str, limit: &str) -> String {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    format!("{} LIMIT {}", sql, limit)
}

/// Rows per page, current page and label templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationState {
    rpp: u64,
    page: u64,
    next_string: Option<String>,
    prev_string: Option<String>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            rpp: 10,
            page: 1,
            next_string: None,
            prev_string: None,
        }
    }
}

impl PaginationState {
    pub fn rpp(&self) -> u64 {
        self.rpp
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn next_string(&self) -> Option<&str> {
        self.next_string.as_deref()
    }

    pub fn prev_string(&self) -> Option<&str> {
        self.prev_string.as_deref()
    }

    /// Set rows per page; values below 1 are ignored.
    pub fn set_rpp(&mut self, rpp: i64) -> bool {
        if rpp < 1 {
            return false;
        }
        self.rpp = rpp as u64;
        true
    }

    /// Set the current page; values below 1 are ignored.
    pub fn set_page(&mut self, page: i64) -> bool {
        if page < 1 {
            return false;
        }
        self.page = page as u64;
        true
    }

    /// Label template for the next page, `{$next}` is replaced by its number.
    pub fn set_next_string(&mut self, template: Option<String>) {
        self.next_string = template;
    }

    /// Label template for the previous page, `{$prev}` is replaced by its number.
    pub fn set_prev_string(&mut self, template: Option<String>) {
        self.prev_string = template;
    }

    /// Apply a setter record (`rpp`, `page`, `next_string`, `prev_string`).
    /// Unknown keys and invalid numbers are ignored.
    pub fn apply(&mut self, record: &Record) {
        for (key, value) in record.iter() {
            match key {
                "rpp" => {
                    if let Some(n) = value.as_int() {
                        self.set_rpp(n);
                    }
                }
                "page" => {
                    if let Some(n) = value.as_int() {
                        self.set_page(n);
                    }
                }
                "next_string" => self.set_next_string(template(value)),
                "prev_string" => self.set_prev_string(template(value)),
                _ => {}
            }
        }
    }
}

fn template(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.as_text()),
    }
}

/// Snapshot of the state a query was windowed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub offset: u64,
    pub rpp: u64,
    pub page: u64,
    next_string: Option<String>,
    prev_string: Option<String>,
}

/// Pagination data returned alongside a page of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rpp: u64,
    pub page: u64,
    /// Next page number, 0 when there is none
    pub next: u64,
    /// Previous page number, 0 when there is none
    pub prev: u64,
    pub offset: u64,
    pub next_string: String,
    pub prev_string: String,
}

/// Window `sql` with the current state: `LIMIT <offset>, <rpp + 1>`.
///
/// Offset and row count saturate at `u64::MAX`, the largest LIMIT MySQL accepts.
pub fn prepare(sql: &str, state: &PaginationState) -> RapidResult<(String, Window)> {
    if has_limit(sql) {
        return Err(RapidError::PaginationConflict);
    }

    let window = Window {
        offset: (state.page - 1).saturating_mul(state.rpp),
        rpp: state.rpp,
        page: state.page,
        next_string: state.next_string.clone(),
        prev_string: state.prev_string.clone(),
    };
    let sql = append_limit(sql, &format!("{}, {}", window.offset, window.rpp.saturating_add(1)));
    Ok((sql, window))
}

/// Trim the lookahead row and derive next/prev page numbers and labels.
pub fn finalize<T>(mut rows: Vec<T>, window: Window) -> (Vec<T>, Page) {
    let mut next = 0;
    let mut prev = 0;

    if rows.len() as u64 > window.rpp {
        rows.truncate(window.rpp as usize);
        next = window.page + 1;
    }
    if window.page > 1 {
        prev = window.page - 1;
    }

    let page = Page {
        rpp: window.rpp,
        page: window.page,
        next,
        prev,
        offset: window.offset,
        next_string: label(window.next_string.as_deref(), "{$next}", next),
        prev_string: label(window.prev_string.as_deref(), "{$prev}", prev),
    };
    (rows, page)
}

fn label(template: Option<&str>, token: &str, number: u64) -> String {
    match template {
        Some(t) if number > 0 => t.replace(token, &number.to_string()),
        _ => String::new(),
    }
}
