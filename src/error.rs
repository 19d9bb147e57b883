//! Error types for rapidsql.

use thiserror::Error;

/// Coarse classification of a [`RapidError`].
///
/// Grammar and config errors are always returned to the caller. State and
/// backend errors are recorded on the connection and only surface when the
/// connection is configured to surface errors. Cache write errors are always
/// surfaced; cache read errors are treated as a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Grammar,
    State,
    Backend,
    Cache,
    Config,
}

/// The main error type for rapidsql operations.
#[derive(Debug, Error)]
pub enum RapidError {
    /// Failed to parse the command string.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Unknown `:verb`.
    #[error("Invalid command '{0}'")]
    UnknownCommand(String),

    /// PAGINATION requested on SQL that already carries a LIMIT.
    #[error("Failed to apply pagination to query, LIMIT clause already exists in query")]
    PaginationConflict,

    /// PAGINATION requested on a manual query that is not a SELECT.
    #[error("Failed to apply pagination to query, query must begin with SELECT keyword")]
    PaginationNotSelect,

    /// MODEL requested on a clause that already carries a LIMIT.
    #[error("Failed to initialize model object, LIMIT clause already exists in query")]
    ModelLimit,

    /// A write verb received no keyed record of columns and values.
    #[error("{verb} failed: columns and values must be a keyed record")]
    MissingColumns { verb: &'static str },

    /// A verb that needs a table was given none.
    #[error("Command '{0}' requires a table")]
    MissingTable(String),

    /// Named and positional parameters were mixed in one statement.
    #[error("Cannot mix named and positional parameters")]
    MixedParams,

    /// Unparseable cache expiry.
    #[error("Invalid cache expire '{0}'")]
    InvalidExpire(String),

    /// A verb that does not produce SQL was compiled.
    #[error("Command '{0}' does not produce SQL")]
    NotSql(String),

    /// No connection registered under this id.
    #[error("Connection ID '{0}' does not exist")]
    UnknownConnection(u32),

    /// A connection is already registered under this id.
    #[error("Connection ID '{0}' already exists")]
    DuplicateConnection(u32),

    /// A raw SQL fragment reached parameter binding.
    #[error("Invalid query parameter '{0}': raw SQL cannot be bound (only bind scalar values)")]
    InvalidParam(String),

    /// A named placeholder has no value.
    #[error("Missing value for query parameter ':{0}'")]
    MissingParam(String),

    /// Execution failure reported by the backend.
    #[error("Database error: {0}")]
    Backend(String),

    /// Connection failure reported by the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Cache read failure.
    #[error("Failed to read cache entry '{0}'")]
    CacheRead(String),

    /// Cache write failure.
    #[error("Failed to write cache entry '{key}': {message}")]
    CacheWrite { key: String, message: String },

    /// Invalid cache key override.
    #[error("Failed to set cache key '{0}', invalid characters, only word characters and '-' allowed")]
    InvalidCacheKey(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RapidError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a cache write error.
    pub fn cache_write(key: impl Into<String>, message: impl ToString) -> Self {
        Self::CacheWrite {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Parse { .. }
            | Self::UnknownCommand(_)
            | Self::PaginationConflict
            | Self::PaginationNotSelect
            | Self::ModelLimit
            | Self::MissingColumns { .. }
            | Self::MissingTable(_)
            | Self::MixedParams
            | Self::InvalidExpire(_)
            | Self::NotSql(_) => ErrorClass::Grammar,
            Self::UnknownConnection(_)
            | Self::DuplicateConnection(_)
            | Self::InvalidParam(_)
            | Self::MissingParam(_) => ErrorClass::State,
            Self::Backend(_) | Self::Connection(_) => ErrorClass::Backend,
            Self::CacheRead(_) | Self::CacheWrite { .. } => ErrorClass::Cache,
            Self::InvalidCacheKey(_) | Self::Config(_) | Self::Io(_) => ErrorClass::Config,
        }
    }

    /// Whether this error is recorded on the connection and subject to the
    /// connection's surfacing policy.
    pub fn is_recordable(&self) -> bool {
        matches!(self.class(), ErrorClass::State | ErrorClass::Backend)
    }
}

/// Result type alias for rapidsql operations.
pub type RapidResult<T> = Result<T, RapidError>;
