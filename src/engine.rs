//! Execution dispatcher.
//!
//! [`Engine`] owns every piece of session state: registered connections,
//! pagination settings and the optional result cache. Each [`Engine::exec`]
//! tokenizes a command, compiles it, consults the cache, runs it on the
//! connection's backend and optionally decorates the result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::ast::{Command, ConnectionId, Verb};
use crate::backend::{Backend, Connector};
use crate::cache::{Cache, Expiry};
use crate::decorate::Decorator;
use crate::error::{RapidError, RapidResult};
use crate::options::{QueryOption, Resolved, resolve};
use crate::pagination::{self, Page, PaginationState};
use crate::parser::parse;
use crate::registry::{
    ConnectionConfig, ConnectionDebug, ConnectionState, DEFAULT_PRIMARY_KEY, KeyMap, Registry,
};
use crate::transpiler::{QueryKind, Shape, Statement, ToSql};
use crate::value::Params;

static SELECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*select\b").expect("valid regex"));

/// One command invocation: the command string, positional arguments and an
/// optional decorator.
#[derive(Debug, Clone, Default)]
pub struct Call {
    command: String,
    args: Vec<Params>,
    decorator: Option<Decorator>,
}

impl Call {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Append a positional argument (column values, query params, setters).
    pub fn arg(mut self, params: impl Into<Params>) -> Self {
        self.args.push(params.into());
        self
    }

    /// Decorate the result with `template`.
    pub fn decorate(mut self, template: impl Into<String>) -> Self {
        match &mut self.decorator {
            Some(decorator) => decorator.template = template.into(),
            None => self.decorator = Some(Decorator::new(template)),
        }
        self
    }

    /// Register a decoration filter.
    pub fn filter(
        mut self,
        name: impl Into<String>,
        filter: impl Fn(&JsonValue) -> String + Send + Sync + 'static,
    ) -> Self {
        let decorator = self.decorator.take().unwrap_or_default();
        self.decorator = Some(decorator.filter(name, filter));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[Params] {
        &self.args
    }
}

impl From<&str> for Call {
    fn from(command: &str) -> Self {
        Call::new(command)
    }
}

/// Record-wrapper descriptor returned by the MODEL option.
///
/// `clause` already filters on `<key>=:<key>`; the wrapper binds the key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelQuery {
    pub connection_id: ConnectionId,
    pub table: String,
    /// Selected columns, empty for all
    pub columns: Vec<String>,
    pub key: String,
    pub clause: String,
    pub params: Params,
}

impl ModelQuery {
    /// SELECT statement for loading one record.
    pub fn select_sql(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        format!("SELECT {} FROM {} {} LIMIT 1", columns, self.table, self.clause)
    }
}

/// Result of [`Engine::exec`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Rows(Vec<JsonValue>),
    /// First row, `None` when nothing matched
    Row(Option<JsonValue>),
    Paged {
        pagination: Page,
        rows: Vec<JsonValue>,
    },
    /// Decorated page of rows
    PagedText {
        pagination: Page,
        rows: String,
    },
    Affected(u64),
    Count(i64),
    Bool(bool),
    Id(u64),
    Text(String),
    /// Compiled SQL, not executed
    Sql(String),
    Names(Vec<String>),
    Keys(BTreeMap<String, String>),
    Key(String),
    Pagination(PaginationState),
    Log(Vec<String>),
    Debug(Vec<ConnectionDebug>),
    Model(ModelQuery),
    LastError(Option<String>),
    Done,
}

impl Output {
    /// Rows of a row-returning result.
    pub fn rows(&self) -> Option<&[JsonValue]> {
        match self {
            Output::Rows(rows) | Output::Paged { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// The neutral result of a failed, non-surfaced query.
    pub fn is_failure(&self) -> bool {
        matches!(self, Output::Bool(false))
    }

    fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Rows(rows) => Output::Rows(rows),
            Outcome::Affected(n) => Output::Affected(n),
            Outcome::Done => Output::Done,
        }
    }
}

/// What the backend produced for one statement.
#[derive(Debug)]
enum Outcome {
    Rows(Vec<JsonValue>),
    Affected(u64),
    Done,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunFlags {
    cache: bool,
}

impl RunFlags {
    fn from_options(options: &Resolved) -> Self {
        Self {
            cache: options.has(QueryOption::Cache),
        }
    }
}

/// How a verb's result is decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecorateMode {
    /// Render rows with the template
    Data,
    /// Rows render as data; scalars as `test` when the template has a
    /// `?:` branch, else as `string`
    Detect,
    /// Insert the scalar into the template
    String,
    /// Pick a branch of `yes ?: no`
    Test,
    /// Result is returned undecorated
    Skip,
}

impl DecorateMode {
    fn for_verb(verb: Option<Verb>) -> Self {
        match verb {
            None | Some(Verb::CallRows) => DecorateMode::Data,
            Some(Verb::Query) => DecorateMode::Detect,
            Some(Verb::ErrorLast) => DecorateMode::String,
            Some(
                Verb::Insert
                | Verb::Replace
                | Verb::LogHandler
                | Verb::Update
                | Verb::Delete
                | Verb::Call
                | Verb::CallAffected
                | Verb::Count
                | Verb::Exists
                | Verb::Id
                | Verb::Error,
            ) => DecorateMode::Test,
            Some(_) => DecorateMode::Skip,
        }
    }
}

enum TxOp {
    Begin,
    Commit,
    Rollback,
}

/// Command dispatcher over one [`Connector`].
pub struct Engine<C: Connector> {
    connector: C,
    registry: Registry<C::Backend>,
    pagination: PaginationState,
    cache: Option<Cache>,
}

impl<C: Connector> Engine<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            registry: Registry::default(),
            pagination: PaginationState::default(),
            cache: None,
        }
    }

    /// Attach a result cache (required by the CACHE option).
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn set_cache(&mut self, cache: Cache) {
        self.cache = Some(cache);
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    pub fn cache_mut(&mut self) -> Option<&mut Cache> {
        self.cache.as_mut()
    }

    /// Register a connection; it connects on first use.
    pub fn register(&mut self, config: ConnectionConfig) -> RapidResult<ConnectionId> {
        let host = config.host.clone();
        let id = self.registry.register(config)?;
        tracing::info!(connection = id, host = %host, "registered connection");
        Ok(id)
    }

    pub fn registry(&self) -> &Registry<C::Backend> {
        &self.registry
    }

    /// Primary key overrides of a connection.
    pub fn keys(&self, id: ConnectionId) -> RapidResult<&KeyMap> {
        Ok(&self.registry.get(id)?.keys)
    }

    /// Override the primary key column of `table` on a connection.
    pub fn set_key(&mut self, id: ConnectionId, table: &str, key: &str) -> RapidResult<()> {
        self.registry.get_mut(id)?.keys.set(table, key);
        Ok(())
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut PaginationState {
        &mut self.pagination
    }

    /// Tokenize a command and scope a row selector with the connection's
    /// primary key and the connector's quoting.
    pub fn tokenize(&self, input: &str) -> RapidResult<Command> {
        let mut cmd = parse(input)?;
        if let Some(id) = cmd.row_id.clone() {
            if !cmd.table.is_empty() {
                let key = self
                    .registry
                    .get(cmd.connection_id)
                    .map(|state| state.keys.get(&cmd.table).to_string())
                    .unwrap_or_else(|_| DEFAULT_PRIMARY_KEY.to_string());
                cmd.scope_to_row(&key, &self.connector.quote(&id));
            }
        }
        Ok(cmd)
    }

    /// Execute one command.
    pub async fn exec(&mut self, call: impl Into<Call>) -> RapidResult<Output> {
        let Call {
            command,
            args,
            decorator,
        } = call.into();

        let cmd = self.tokenize(&command)?;
        let options = resolve(&cmd.option_tokens);
        let mode = DecorateMode::for_verb(cmd.verb);

        let output = match cmd.verb {
            None => self.select(cmd, &options, &args).await?,
            Some(Verb::Query) => self.manual_query(cmd, &options, &args).await?,
            Some(verb) if verb.produces_sql() => self.statement(verb, cmd, &options, &args).await?,
            Some(verb) => self.control(verb, cmd, &args).await?,
        };

        Ok(match decorator {
            Some(decorator) => decorate(output, &decorator, mode),
            None => output,
        })
    }

    /// Implicit SELECT, with row selector, FIRST, MODEL and PAGINATION.
    async fn select(
        &mut self,
        mut cmd: Command,
        options: &Resolved,
        args: &[Params],
    ) -> RapidResult<Output> {
        let stmt = cmd.to_sql(options, args)?;
        let conn = cmd.connection_id;
        let flags = RunFlags::from_options(options);

        let paged = if options.has(QueryOption::Pagination) {
            Some(pagination::prepare(&stmt.sql, &self.pagination)?)
        } else {
            None
        };

        if options.has(QueryOption::Query) {
            return Ok(Output::Sql(match paged {
                Some((sql, _)) => sql,
                None => stmt.sql,
            }));
        }

        if options.has(QueryOption::Model) && cmd.row_id.is_none() {
            if pagination::has_limit(&cmd.clause) {
                return Err(RapidError::ModelLimit);
            }
            let key = self.registry.get(conn)?.keys.get(&cmd.table).to_string();
            cmd.scope_to_model_key(&key);
            return Ok(Output::Model(ModelQuery {
                connection_id: conn,
                table: cmd.table,
                columns: cmd.columns.names().to_vec(),
                key,
                clause: cmd.clause,
                params: stmt.params,
            }));
        }

        if let Some((sql, window)) = paged {
            let rows = match self.run(conn, &sql, &stmt.params, QueryKind::Rows, flags).await? {
                Some(Outcome::Rows(rows)) => rows,
                Some(_) => Vec::new(),
                None => return Ok(Output::Bool(false)),
            };
            let (rows, page) = pagination::finalize(rows, window);
            return Ok(Output::Paged {
                pagination: page,
                rows,
            });
        }

        if cmd.row_id.is_some() || options.has(QueryOption::First) {
            return self.first_row(conn, &stmt, QueryKind::Rows, flags).await;
        }

        self.execute(conn, &stmt, flags).await
    }

    /// `:query <sql>` with QUERY, PAGINATION and FIRST.
    async fn manual_query(
        &mut self,
        cmd: Command,
        options: &Resolved,
        args: &[Params],
    ) -> RapidResult<Output> {
        let stmt = cmd.to_sql(options, args)?;
        let conn = cmd.connection_id;
        let flags = RunFlags::from_options(options);

        if options.has(QueryOption::Query) {
            return Ok(Output::Sql(stmt.sql));
        }

        if options.has(QueryOption::Pagination) {
            if !SELECT_RE.is_match(&stmt.sql) {
                return Err(RapidError::PaginationNotSelect);
            }
            let (sql, window) = pagination::prepare(&stmt.sql, &self.pagination)?;
            let rows = match self.run(conn, &sql, &stmt.params, QueryKind::Rows, flags).await? {
                Some(Outcome::Rows(rows)) => rows,
                Some(_) => Vec::new(),
                None => return Ok(Output::Bool(false)),
            };
            let (rows, page) = pagination::finalize(rows, window);
            return Ok(Output::Paged {
                pagination: page,
                rows,
            });
        }

        if options.has(QueryOption::First) {
            return self.first_row(conn, &stmt, QueryKind::Infer, flags).await;
        }

        self.execute(conn, &stmt, flags).await
    }

    /// Verbs that compile to one statement.
    async fn statement(
        &mut self,
        verb: Verb,
        cmd: Command,
        options: &Resolved,
        args: &[Params],
    ) -> RapidResult<Output> {
        let stmt = cmd.to_sql(options, args)?;
        let conn = cmd.connection_id;

        if options.has(QueryOption::Query) {
            return Ok(Output::Sql(stmt.sql));
        }

        match verb {
            Verb::LogHandler => {
                if !self.registry.contains(conn) {
                    return Ok(Output::Done);
                }
                self.without_logging(conn, &stmt).await?;
                Ok(Output::Done)
            }
            Verb::Count => {
                let row = match self.first(conn, &stmt).await? {
                    Some(row) => row,
                    None => return Ok(Output::Count(0)),
                };
                let count = row
                    .and_then(|r| field(&r, "count").and_then(json_int))
                    .unwrap_or(0);
                Ok(Output::Count(count))
            }
            Verb::Exists => {
                let row = match self.first(conn, &stmt).await? {
                    Some(row) => row,
                    None => return Ok(Output::Bool(false)),
                };
                let is_set = row
                    .and_then(|r| field(&r, "is_set").and_then(json_int))
                    .unwrap_or(0);
                Ok(Output::Bool(is_set > 0))
            }
            Verb::Columns | Verb::Tables => {
                match self.run(conn, &stmt.sql, &stmt.params, stmt.kind, RunFlags::default()).await? {
                    Some(Outcome::Rows(rows)) => Ok(Output::Names(rows.iter().filter_map(first_column).collect())),
                    Some(_) => Ok(Output::Names(Vec::new())),
                    None => Ok(Output::Bool(false)),
                }
            }
            _ => self.execute(conn, &stmt, RunFlags::default()).await,
        }
    }

    /// Verbs that read or change engine state without compiling SQL.
    async fn control(&mut self, verb: Verb, cmd: Command, args: &[Params]) -> RapidResult<Output> {
        let conn = cmd.connection_id;
        match verb {
            Verb::Key => {
                let state = self.registry.get_mut(conn)?;
                if let Some(record) = args.first().and_then(Params::as_record) {
                    for (table, key) in record.iter() {
                        state.keys.set(table, key.as_text());
                    }
                    return Ok(Output::Keys(state.keys.all().clone()));
                }
                if !cmd.clause.is_empty() && !cmd.table.is_empty() {
                    state.keys.set(cmd.table.clone(), cmd.clause.clone());
                }
                Ok(Output::Key(state.keys.get(&cmd.table).to_string()))
            }
            Verb::Cache => {
                if !cmd.clause.is_empty() {
                    let expire: Expiry = cmd.clause.parse()?;
                    self.cache
                        .as_mut()
                        .ok_or_else(|| RapidError::config("No cache configured"))?
                        .set_expire(expire);
                }
                Ok(Output::Done)
            }
            Verb::Pagination => {
                if let Some(record) = args.first().and_then(Params::as_record) {
                    self.pagination.apply(record);
                }
                Ok(Output::Pagination(self.pagination.clone()))
            }
            Verb::Id => {
                let result = match self.connected(conn).await {
                    Ok(backend) => backend.last_insert_id().await,
                    Err(e) => Err(e),
                };
                Ok(self.surface(conn, result)?.map_or(Output::Bool(false), Output::Id))
            }
            Verb::Transaction => self.transaction(conn, TxOp::Begin).await,
            Verb::Commit => self.transaction(conn, TxOp::Commit).await,
            Verb::Rollback => self.transaction(conn, TxOp::Rollback).await,
            Verb::Error => Ok(Output::Bool(self.registry.get(conn)?.has_error())),
            Verb::ErrorLast => Ok(Output::LastError(
                self.registry.get(conn)?.last_error().map(String::from),
            )),
            Verb::Log => Ok(Output::Log(self.registry.get(conn)?.log().to_vec())),
            Verb::Debug => Ok(Output::Debug(
                self.registry.iter().map(ConnectionState::debug).collect(),
            )),
            other => Err(RapidError::NotSql(other.to_string())),
        }
    }

    async fn transaction(&mut self, conn: ConnectionId, op: TxOp) -> RapidResult<Output> {
        let result = match self.connected(conn).await {
            Ok(backend) => match op {
                TxOp::Begin => backend.begin().await,
                TxOp::Commit => backend.commit().await,
                TxOp::Rollback => backend.rollback().await,
            },
            Err(e) => Err(e),
        };
        Ok(self.surface(conn, result)?.map_or(Output::Bool(false), |_| Output::Bool(true)))
    }

    /// Execute and map the outcome directly.
    async fn execute(
        &mut self,
        conn: ConnectionId,
        stmt: &Statement,
        flags: RunFlags,
    ) -> RapidResult<Output> {
        Ok(self
            .run(conn, &stmt.sql, &stmt.params, stmt.kind, flags)
            .await?
            .map_or(Output::Bool(false), Output::from_outcome))
    }

    /// First row only, appending `LIMIT 1` when the SQL has no LIMIT.
    async fn first_row(
        &mut self,
        conn: ConnectionId,
        stmt: &Statement,
        kind: QueryKind,
        flags: RunFlags,
    ) -> RapidResult<Output> {
        let sql = if pagination::has_limit(&stmt.sql) {
            stmt.sql.clone()
        } else {
            pagination::append_limit(&stmt.sql, "1")
        };
        Ok(match self.run(conn, &sql, &stmt.params, kind, flags).await? {
            Some(Outcome::Rows(rows)) => Output::Row(rows.into_iter().next()),
            Some(other) => Output::from_outcome(other),
            None => Output::Bool(false),
        })
    }

    /// First row of an aggregate statement; `Some(None)` when no row came back.
    async fn first(
        &mut self,
        conn: ConnectionId,
        stmt: &Statement,
    ) -> RapidResult<Option<Option<JsonValue>>> {
        Ok(self
            .run(conn, &stmt.sql, &stmt.params, stmt.kind, RunFlags::default())
            .await?
            .map(|outcome| match outcome {
                Outcome::Rows(rows) => rows.into_iter().next(),
                _ => None,
            }))
    }

    /// Run with the connection's debug log switched off.
    async fn without_logging(&mut self, conn: ConnectionId, stmt: &Statement) -> RapidResult<()> {
        let state = self.registry.get_mut(conn)?;
        let logging = std::mem::replace(&mut state.config.logging, false);
        let result = self
            .run(conn, &stmt.sql, &stmt.params, stmt.kind, RunFlags::default())
            .await;
        if let Ok(state) = self.registry.get_mut(conn) {
            state.config.logging = logging;
        }
        result.map(|_| ())
    }

    /// Dispatch one statement and apply the connection's error policy.
    ///
    /// `Ok(None)` is a recorded failure that is not surfaced.
    async fn run(
        &mut self,
        conn: ConnectionId,
        sql: &str,
        params: &Params,
        kind: QueryKind,
        flags: RunFlags,
    ) -> RapidResult<Option<Outcome>> {
        let result = self.dispatch(conn, sql, params, kind, flags).await;
        self.surface(conn, result)
    }

    /// Record state and backend failures on the connection. A connection that
    /// surfaces errors hands them to its handler if it has one, else returns
    /// them.
    fn surface<T>(&mut self, conn: ConnectionId, result: RapidResult<T>) -> RapidResult<Option<T>> {
        let err = match result {
            Ok(value) => return Ok(Some(value)),
            Err(e) if e.is_recordable() => e,
            Err(e) => return Err(e),
        };

        let state = self.registry.get_mut(conn)?;
        let message = err.to_string();
        state.record_error(message.clone());

        if !state.config.surface_errors {
            return Ok(None);
        }
        if let Some(handler) = state.config.error_handler.clone() {
            handler(&message);
            return Ok(None);
        }
        Err(err)
    }

    async fn dispatch(
        &mut self,
        conn: ConnectionId,
        sql: &str,
        params: &Params,
        kind: QueryKind,
        flags: RunFlags,
    ) -> RapidResult<Outcome> {
        let state = self.registry.get_mut(conn)?;
        state.push_log(format!("Query: {}", sql));
        if !params.is_empty() {
            params.ensure_bindable()?;
            state.push_log(format!("(Query params: {})", params.describe()));
        }

        let cache_key = if flags.cache {
            let cache = self
                .cache
                .as_mut()
                .ok_or_else(|| RapidError::config("CACHE option used without a configured cache"))?;
            let key = cache.key(conn, sql, params);
            if cache.has(&key) {
                match cache.read(&key) {
                    Ok(JsonValue::Array(rows)) => {
                        state.push_log(format!("(Cache read: {})", key));
                        return Ok(Outcome::Rows(rows));
                    }
                    Ok(_) => tracing::debug!(key = %key, "cache entry is not a row list, treating as miss"),
                    Err(e) => tracing::debug!(key = %key, error = %e, "cache read failed, treating as miss"),
                }
            }
            Some(key)
        } else {
            None
        };

        if state.backend.is_none() {
            let backend = self.connector.connect(&state.config).await?;
            state.backend = Some(backend);
        }
        let backend = backend_of(state)?;

        let outcome = match kind.shape(sql) {
            Shape::Rows => {
                let rows: Vec<JsonValue> = backend
                    .fetch(sql, params)
                    .await?
                    .into_iter()
                    .map(JsonValue::Object)
                    .collect();
                if let (Some(key), Some(cache)) = (&cache_key, &self.cache) {
                    state.push_log(format!("(Cache write: {})", key));
                    cache.write(key, &JsonValue::Array(rows.clone()))?;
                }
                Outcome::Rows(rows)
            }
            Shape::Affected => Outcome::Affected(backend.execute(sql, params).await?),
            Shape::Done => {
                backend.execute(sql, params).await?;
                Outcome::Done
            }
        };
        Ok(outcome)
    }

    /// Backend of a connection, connecting it first if needed.
    async fn connected(&mut self, conn: ConnectionId) -> RapidResult<&mut C::Backend> {
        let state = self.registry.get_mut(conn)?;
        if state.backend.is_none() {
            let backend = self.connector.connect(&state.config).await?;
            state.backend = Some(backend);
        }
        backend_of(state)
    }
}

fn backend_of<B>(state: &mut ConnectionState<B>) -> RapidResult<&mut B> {
    let id = state.id;
    state
        .backend
        .as_mut()
        .ok_or_else(|| RapidError::Connection(format!("connection '{}' is not open", id)))
}

fn field<'a>(row: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    row.as_object().and_then(|map| map.get(name))
}

fn json_int(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn first_column(row: &JsonValue) -> Option<String> {
    let value = match row {
        JsonValue::Object(map) => map.values().next()?,
        JsonValue::Array(values) => values.first()?,
        _ => return None,
    };
    Some(match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Apply a decorator to a result according to the verb's mode.
fn decorate(output: Output, decorator: &Decorator, mode: DecorateMode) -> Output {
    match mode {
        DecorateMode::Skip => output,
        DecorateMode::Data => match output {
            Output::Rows(rows) => Output::Text(decorator.data(&JsonValue::Array(rows))),
            Output::Row(Some(row)) => Output::Text(decorator.data(&row)),
            Output::Row(None) => Output::Text(String::new()),
            Output::Paged { pagination, rows } => Output::PagedText {
                pagination,
                rows: decorator.data(&JsonValue::Array(rows)),
            },
            other => other,
        },
        DecorateMode::Detect => match output {
            rows @ (Output::Rows(_) | Output::Row(_) | Output::Paged { .. }) => {
                decorate(rows, decorator, DecorateMode::Data)
            }
            other if decorator.is_test() => decorate(other, decorator, DecorateMode::Test),
            other => decorate(other, decorator, DecorateMode::String),
        },
        DecorateMode::String => match result_value(&output) {
            Some(value) => Output::Text(decorator.string(&value)),
            None => output,
        },
        DecorateMode::Test => match result_value(&output) {
            Some(value) => Output::Text(decorator.test(&value)),
            None => output,
        },
    }
}

/// The value a scalar decoration sees.
fn result_value(output: &Output) -> Option<JsonValue> {
    Some(match output {
        Output::Rows(rows) | Output::Paged { rows, .. } => JsonValue::Array(rows.clone()),
        Output::Row(row) => row.clone().unwrap_or(JsonValue::Null),
        Output::Affected(n) | Output::Id(n) => JsonValue::from(*n),
        Output::Count(n) => JsonValue::from(*n),
        Output::Bool(b) => JsonValue::Bool(*b),
        Output::Done => JsonValue::Bool(true),
        Output::Text(s) | Output::Sql(s) => JsonValue::String(s.clone()),
        Output::LastError(message) => JsonValue::from(message.clone()),
        _ => return None,
    })
}
