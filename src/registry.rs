//! Connection registry.
//!
//! Maps a connection id to its configuration, primary key overrides, debug
//! log, last error and (once first used) its backend connection.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::ConnectionId;
use crate::error::{RapidError, RapidResult};

/// Primary key column used when a table has no override.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Receives the message of a recorded error instead of it being returned.
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives every debug log line; returning `true` keeps the line out of the
/// in-memory log.
pub type LogHandler = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Table name → primary key column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyMap(BTreeMap<String, String>);

impl KeyMap {
    /// Primary key column of `table`, `"id"` when not overridden.
    pub fn get(&self, table: &str) -> &str {
        self.0
            .get(table)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    /// Override the primary key column of `table`. Empty keys are ignored.
    pub fn set(&mut self, table: impl Into<String>, key: impl Into<String>) {
        let key = key.into();
        if !key.trim().is_empty() {
            self.0.insert(table.into(), key.trim().to_string());
        }
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Configuration of one logical backend target.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Requested id; auto-assigned when `None`
    pub id: Option<ConnectionId>,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Keep a debug log of queries and errors
    pub logging: bool,
    /// Return recorded errors to the caller
    pub surface_errors: bool,
    /// Accepted for compatibility; rows are keyed either way
    pub object_results: bool,
    pub error_handler: Option<ErrorHandler>,
    pub log_handler: Option<LogHandler>,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            host: host.into(),
            port: None,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            logging: true,
            surface_errors: true,
            object_results: true,
            error_handler: None,
            log_handler: None,
        }
    }

    /// Set the connection id
    pub fn id(mut self, id: ConnectionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub fn surface_errors(mut self, enabled: bool) -> Self {
        self.surface_errors = enabled;
        self
    }

    pub fn object_results(mut self, enabled: bool) -> Self {
        self.object_results = enabled;
        self
    }

    /// Install an error handler
    pub fn on_error(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Install a log handler
    pub fn on_log(mut self, handler: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.log_handler = Some(Arc::new(handler));
        self
    }

    fn validate(&self) -> RapidResult<()> {
        if self.host.trim().is_empty() || self.database.trim().is_empty() || self.user.trim().is_empty() {
            return Err(RapidError::config(
                "Invalid connection parameters (required: host, database, user, password)",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("logging", &self.logging)
            .field("surface_errors", &self.surface_errors)
            .field("object_results", &self.object_results)
            .field("error_handler", &self.error_handler.is_some())
            .field("log_handler", &self.log_handler.is_some())
            .finish()
    }
}

/// Runtime state of one registered connection.
pub struct ConnectionState<B> {
    pub id: ConnectionId,
    pub config: ConnectionConfig,
    pub keys: KeyMap,
    log: Vec<String>,
    last_error: Option<String>,
    pub(crate) backend: Option<B>,
}

impl<B> ConnectionState<B> {
    fn new(id: ConnectionId, config: ConnectionConfig) -> Self {
        Self {
            id,
            config,
            keys: KeyMap::default(),
            log: Vec::new(),
            last_error: None,
            backend: None,
        }
    }

    /// Append a debug log line (no-op when logging is disabled).
    pub fn push_log(&mut self, message: impl Into<String>) {
        if !self.config.logging {
            return;
        }
        let message = message.into();
        tracing::debug!(connection = self.id, "{}", message);
        if let Some(handler) = &self.config.log_handler {
            if handler(&message) {
                return;
            }
        }
        self.log.push(message);
    }

    /// Record an error as the last error and log it.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(connection = self.id, "{}", message);
        self.push_log(format!("Error: {}", message));
        self.last_error = Some(message);
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    /// Snapshot for the `debug` verb.
    pub fn debug(&self) -> ConnectionDebug {
        ConnectionDebug {
            id: self.id,
            host: self.config.host.clone(),
            database: self.config.database.clone(),
            logging: self.config.logging,
            surface_errors: self.config.surface_errors,
            object_results: self.config.object_results,
            keys: self.keys.all().clone(),
            log: self.log.clone(),
        }
    }
}

/// Debug snapshot of a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionDebug {
    pub id: ConnectionId,
    pub host: String,
    pub database: String,
    pub logging: bool,
    pub surface_errors: bool,
    pub object_results: bool,
    pub keys: BTreeMap<String, String>,
    pub log: Vec<String>,
}

/// All registered connections.
pub struct Registry<B> {
    connections: BTreeMap<ConnectionId, ConnectionState<B>>,
    last_auto_id: ConnectionId,
}

impl<B> Default for Registry<B> {
    fn default() -> Self {
        Self {
            connections: BTreeMap::new(),
            last_auto_id: 0,
        }
    }
}

impl<B> Registry<B> {
    /// Register a connection; the backend is connected on first use.
    pub fn register(&mut self, config: ConnectionConfig) -> RapidResult<ConnectionId> {
        config.validate()?;

        let id = match config.id {
            Some(id) if self.connections.contains_key(&id) => {
                return Err(RapidError::DuplicateConnection(id));
            }
            Some(id) => id,
            None => {
                self.last_auto_id += 1;
                while self.connections.contains_key(&self.last_auto_id) {
                    self.last_auto_id += 1;
                }
                self.last_auto_id
            }
        };

        let mut state = ConnectionState::new(id, config);
        state.push_log(format!(
            "Connection '{}' registered (host: '{}', database: '{}')",
            id, state.config.host, state.config.database
        ));
        self.connections.insert(id, state);
        Ok(id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn get(&self, id: ConnectionId) -> RapidResult<&ConnectionState<B>> {
        self.connections
            .get(&id)
            .ok_or(RapidError::UnknownConnection(id))
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> RapidResult<&mut ConnectionState<B>> {
        self.connections
            .get_mut(&id)
            .ok_or(RapidError::UnknownConnection(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionState<B>> {
        self.connections.values()
    }
}
