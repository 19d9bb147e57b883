//! Option resolver.
//!
//! `/option` tokens are either one of the known query options or a SQL
//! keyword modifier that is passed through (`users:del/ignore` becomes
//! `DELETE IGNORE FROM users`).

use serde::Serialize;

/// Known query options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryOption {
    /// Accepted for compatibility; rows stay keyed
    Array,
    /// Read/write the result cache
    Cache,
    /// First row only
    First,
    /// Return a model descriptor instead of executing
    Model,
    /// Window the result with the pagination state
    Pagination,
    /// Return the compiled SQL instead of executing
    Query,
}

impl QueryOption {
    pub const ALL: [QueryOption; 6] = [
        QueryOption::Array,
        QueryOption::Cache,
        QueryOption::First,
        QueryOption::Model,
        QueryOption::Pagination,
        QueryOption::Query,
    ];

    fn bit(self) -> u8 {
        match self {
            QueryOption::Array => 0x1,
            QueryOption::Cache => 0x2,
            QueryOption::First => 0x4,
            QueryOption::Model => 0x8,
            QueryOption::Pagination => 0x10,
            QueryOption::Query => 0x20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QueryOption::Array => "ARRAY",
            QueryOption::Cache => "CACHE",
            QueryOption::First => "FIRST",
            QueryOption::Model => "MODEL",
            QueryOption::Pagination => "PAGINATION",
            QueryOption::Query => "QUERY",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.name().eq_ignore_ascii_case(token))
    }
}

/// Bitset of [`QueryOption`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionSet(u8);

impl OptionSet {
    pub fn insert(&mut self, opt: QueryOption) {
        self.0 |= opt.bit();
    }

    pub fn contains(&self, opt: QueryOption) -> bool {
        self.0 & opt.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = QueryOption> + '_ {
        QueryOption::ALL.into_iter().filter(|opt| self.contains(*opt))
    }
}

impl FromIterator<QueryOption> for OptionSet {
    fn from_iter<I: IntoIterator<Item = QueryOption>>(iter: I) -> Self {
        let mut set = OptionSet::default();
        for opt in iter {
            set.insert(opt);
        }
        set
    }
}

/// Resolved options of one command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolved {
    pub flags: OptionSet,
    /// Upper-cased passthrough SQL keywords, in the order given
    pub modifiers: Vec<String>,
}

impl Resolved {
    pub fn has(&self, opt: QueryOption) -> bool {
        self.flags.contains(opt)
    }

    /// Modifiers rendered as a keyword suffix with a leading space, or empty.
    pub fn modifier_sql(&self) -> String {
        self.modifiers.iter().map(|m| format!(" {}", m)).collect()
    }
}

/// Classify option tokens into known flags and SQL modifiers.
pub fn resolve<S: AsRef<str>>(tokens: &[S]) -> Resolved {
    let mut resolved = Resolved::default();
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() {
            continue;
        }
        match QueryOption::from_token(token) {
            Some(opt) => resolved.flags.insert(opt),
            None => resolved.modifiers.push(token.to_uppercase()),
        }
    }
    resolved
}
