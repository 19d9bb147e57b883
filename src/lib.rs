//! # rapidsql
//!
//! Compact command strings compiled to parameterized MySQL and dispatched
//! against registered connections, with optional result caching, paginated
//! windows and template decoration.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rapidsql::prelude::*;
//!
//! let mut engine = Engine::new(MySqlConnector);
//! engine.register(ConnectionConfig::new("localhost", "app", "root", "secret"))?;
//!
//! // SELECT * FROM users WHERE id=7 LIMIT 1
//! let user = engine.exec("users.7").await?;
//!
//! // INSERT IGNORE INTO users(name) VALUES(:name)
//! let added = engine
//!     .exec(Call::new("users:add/ignore").arg(Record::new().set("name", "Shay")))
//!     .await?;
//! ```
//!
//! ## Command Grammar
//!
//! | Part | Example | Meaning |
//! |------|---------|---------|
//! | `[n]` | `[2]users` | Connection id (default 1) |
//! | `table` | `users` | Target table |
//! | `(cols)` | `users(id, name)` | Column list (default `*`) |
//! | `:verb` | `users:count` | Command verb |
//! | `.id` | `users.7` | Single row by primary key |
//! | `/opt` | `users/first` | Option flag or SQL modifier |
//! | clause | `WHERE x = :x` | Remaining SQL |

pub mod ast;
pub mod backend;
pub mod cache;
pub mod config;
pub mod decorate;
pub mod engine;
pub mod error;
pub mod mysql;
pub mod options;
pub mod pagination;
pub mod parser;
pub mod registry;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::backend::{Backend, Connector, Row};
    pub use crate::cache::{Cache, Expiry};
    pub use crate::config::Config;
    pub use crate::decorate::Decorator;
    pub use crate::engine::{Call, Engine, ModelQuery, Output};
    pub use crate::error::*;
    pub use crate::mysql::MySqlConnector;
    pub use crate::options::{QueryOption, resolve};
    pub use crate::pagination::{Page, PaginationState};
    pub use crate::parser::{parse, tokenize};
    pub use crate::registry::{ConnectionConfig, KeyMap};
    pub use crate::transpiler::ToSql;
    pub use crate::value::{Params, Record, Value};
}

/// Parse a command string.
///
/// # Example
///
/// ```
/// use rapidsql::parse;
///
/// let cmd = parse("users(id, email):count WHERE active = 1").unwrap();
/// assert_eq!(cmd.table, "users");
/// assert_eq!(cmd.clause, "WHERE active = 1");
/// ```
pub fn parse(input: &str) -> Result<ast::Command, error::RapidError> {
    parser::parse(input)
}
