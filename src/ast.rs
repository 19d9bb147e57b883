//! Command structure produced by the tokenizer.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RapidError;

/// Connection identifier.
pub type ConnectionId = u32;

/// Connection used when a command carries no `[id]` prefix.
pub const DEFAULT_CONNECTION: ConnectionId = 1;

/// A parsed command string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Target connection (`[2]...`)
    pub connection_id: ConnectionId,
    /// Target table, empty when the command names none
    pub table: String,
    /// Columns to select or write
    pub columns: Columns,
    /// Row selector (`users.7`)
    pub row_id: Option<String>,
    /// Named verb (`users:add`); `None` is an implicit SELECT
    pub verb: Option<Verb>,
    /// Raw `/option` tokens in the order given
    pub option_tokens: Vec<String>,
    /// Residual SQL clause, trimmed
    pub clause: String,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            connection_id: DEFAULT_CONNECTION,
            table: String::new(),
            columns: Columns::All,
            row_id: None,
            verb: None,
            option_tokens: Vec::new(),
            clause: String::new(),
        }
    }
}

impl Command {
    /// Whether this is an implicit SELECT (no verb).
    pub fn is_select(&self) -> bool {
        self.verb.is_none()
    }

    /// Clause rendered with a leading space, or empty.
    pub fn clause_sql(&self) -> String {
        if self.clause.is_empty() {
            String::new()
        } else {
            format!(" {}", self.clause)
        }
    }

    /// Scope the clause to one row: `WHERE <key>=<literal>`, merging an
    /// existing leading `WHERE` with `AND`.
    pub fn scope_to_row(&mut self, key: &str, literal: &str) {
        self.prefix_predicate(&format!("{}={}", key, literal));
    }

    /// Scope the clause to a model key placeholder: `WHERE <key>=:<key>`.
    pub fn scope_to_model_key(&mut self, key: &str) {
        self.prefix_predicate(&format!("{}=:{}", key, key));
    }

    fn prefix_predicate(&mut self, predicate: &str) {
        let rest = self.clause.trim();
        self.clause = match strip_where(rest) {
            Some("") => format!("WHERE {}", predicate),
            Some(conditions) => format!("WHERE {} AND {}", predicate, conditions),
            None if rest.is_empty() => format!("WHERE {}", predicate),
            None => format!("WHERE {} {}", predicate, rest),
        };
    }
}

/// Conditions following a leading `WHERE` keyword, if the clause starts with one.
fn strip_where(clause: &str) -> Option<&str> {
    let head = clause.get(..5)?;
    if !head.eq_ignore_ascii_case("where") {
        return None;
    }
    let rest = &clause[5..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Column list of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Columns {
    /// `*`
    All,
    /// `(c1, c2)`
    Named(Vec<String>),
}

impl Columns {
    pub fn names(&self) -> &[String] {
        match self {
            Columns::All => &[],
            Columns::Named(cols) => cols,
        }
    }
}

impl std::fmt::Display for Columns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Columns::All => write!(f, "*"),
            Columns::Named(cols) => write!(f, "{}", cols.join(", ")),
        }
    }
}

/// Named command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    /// `add` / `insert`
    Insert,
    Replace,
    Call,
    CallAffected,
    CallRows,
    Cache,
    Columns,
    Commit,
    Count,
    Debug,
    /// `del` / `delete`
    Delete,
    Error,
    ErrorLast,
    Exists,
    Id,
    Key,
    Log,
    LogHandler,
    /// `mod` / `update`
    Update,
    Pagination,
    Query,
    Rollback,
    Tables,
    Transaction,
    Truncate,
}

impl Verb {
    /// Every accepted spelling, paired with its verb.
    pub const SPELLINGS: &'static [(&'static str, Verb)] = &[
        ("add", Verb::Insert),
        ("insert", Verb::Insert),
        ("replace", Verb::Replace),
        ("call", Verb::Call),
        ("call_affected", Verb::CallAffected),
        ("call_rows", Verb::CallRows),
        ("cache", Verb::Cache),
        ("columns", Verb::Columns),
        ("commit", Verb::Commit),
        ("count", Verb::Count),
        ("debug", Verb::Debug),
        ("del", Verb::Delete),
        ("delete", Verb::Delete),
        ("error", Verb::Error),
        ("error_last", Verb::ErrorLast),
        ("exists", Verb::Exists),
        ("id", Verb::Id),
        ("key", Verb::Key),
        ("log", Verb::Log),
        ("log_handler", Verb::LogHandler),
        ("mod", Verb::Update),
        ("update", Verb::Update),
        ("pagination", Verb::Pagination),
        ("query", Verb::Query),
        ("rollback", Verb::Rollback),
        ("tables", Verb::Tables),
        ("transaction", Verb::Transaction),
        ("truncate", Verb::Truncate),
    ];

    /// Whether this verb compiles to a SQL statement.
    pub fn produces_sql(&self) -> bool {
        matches!(
            self,
            Verb::Insert
                | Verb::Replace
                | Verb::Call
                | Verb::CallAffected
                | Verb::CallRows
                | Verb::Columns
                | Verb::Count
                | Verb::Delete
                | Verb::Exists
                | Verb::LogHandler
                | Verb::Update
                | Verb::Query
                | Verb::Tables
                | Verb::Truncate
        )
    }

    /// Whether this verb operates on the command's table.
    pub fn needs_table(&self) -> bool {
        matches!(
            self,
            Verb::Insert
                | Verb::Replace
                | Verb::Columns
                | Verb::Count
                | Verb::Delete
                | Verb::Exists
                | Verb::LogHandler
                | Verb::Update
                | Verb::Truncate
        )
    }
}

impl FromStr for Verb {
    type Err = RapidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::SPELLINGS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, verb)| *verb)
            .ok_or_else(|| RapidError::UnknownCommand(s.to_string()))
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = Verb::SPELLINGS
            .iter()
            .rev()
            .find(|(_, verb)| verb == self)
            .map(|(name, _)| *name)
            .unwrap_or("?");
        write!(f, "{}", name)
    }
}
