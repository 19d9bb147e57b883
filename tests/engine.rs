//! Engine integration tests against a scripted backend.
//!
//! The mock connector records every statement it receives and replies from a
//! queue, so these tests run without a MySQL server.

use pretty_assertions::assert_eq;
use rapidsql::backend::{Backend, Connector, Row, bind_named};
use rapidsql::cache::{Cache, CacheStore};
use rapidsql::engine::{Call, Engine, Output};
use rapidsql::error::{RapidError, RapidResult};
use rapidsql::registry::ConnectionConfig;
use rapidsql::value::{Params, Record, Value};
use serde_json::{Value as JsonValue, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

enum Reply {
    Rows(Vec<JsonValue>),
    Affected(u64),
    Fail(&'static str),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    calls: Vec<String>,
    params: Vec<Params>,
    connects: usize,
    fail_connect: bool,
    last_insert_id: u64,
    tx: Vec<&'static str>,
}

#[derive(Clone, Default)]
struct MockConnector(Arc<Mutex<Script>>);

impl MockConnector {
    fn reply(&self, reply: Reply) {
        self.0.lock().unwrap().replies.push_back(reply);
    }

    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.clone()
    }

    fn params(&self) -> Vec<Params> {
        self.0.lock().unwrap().params.clone()
    }

    fn connects(&self) -> usize {
        self.0.lock().unwrap().connects
    }
}

struct MockBackend(Arc<Mutex<Script>>);

impl MockBackend {
    fn record(&self, sql: &str, params: &Params) -> RapidResult<Option<Reply>> {
        bind_named(sql, params)?;
        let mut script = self.0.lock().unwrap();
        script.calls.push(sql.to_string());
        script.params.push(params.clone());
        Ok(script.replies.pop_front())
    }
}

impl Connector for MockConnector {
    type Backend = MockBackend;

    async fn connect(&self, _config: &ConnectionConfig) -> RapidResult<MockBackend> {
        let mut script = self.0.lock().unwrap();
        if script.fail_connect {
            return Err(RapidError::Connection("refused".into()));
        }
        script.connects += 1;
        Ok(MockBackend(self.0.clone()))
    }
}

impl Backend for MockBackend {
    async fn fetch(&mut self, sql: &str, params: &Params) -> RapidResult<Vec<Row>> {
        match self.record(sql, params)? {
            Some(Reply::Rows(rows)) => Ok(rows
                .into_iter()
                .filter_map(|row| match row {
                    JsonValue::Object(map) => Some(map),
                    _ => None,
                })
                .collect()),
            Some(Reply::Fail(message)) => Err(RapidError::Backend(message.into())),
            Some(Reply::Affected(_)) | None => Ok(Vec::new()),
        }
    }

    async fn execute(&mut self, sql: &str, params: &Params) -> RapidResult<u64> {
        match self.record(sql, params)? {
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(message)) => Err(RapidError::Backend(message.into())),
            Some(Reply::Rows(_)) | None => Ok(0),
        }
    }

    async fn last_insert_id(&mut self) -> RapidResult<u64> {
        Ok(self.0.lock().unwrap().last_insert_id)
    }

    async fn begin(&mut self) -> RapidResult<()> {
        self.0.lock().unwrap().tx.push("begin");
        Ok(())
    }

    async fn commit(&mut self) -> RapidResult<()> {
        self.0.lock().unwrap().tx.push("commit");
        Ok(())
    }

    async fn rollback(&mut self) -> RapidResult<()> {
        self.0.lock().unwrap().tx.push("rollback");
        Ok(())
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("localhost", "app", "root", "secret")
}

fn engine_with(config: ConnectionConfig) -> (Engine<MockConnector>, MockConnector) {
    let mock = MockConnector::default();
    let mut engine = Engine::new(mock.clone());
    engine.register(config).unwrap();
    (engine, mock)
}

fn engine() -> (Engine<MockConnector>, MockConnector) {
    engine_with(config())
}

fn users() -> Vec<JsonValue> {
    vec![
        json!({"id": 1, "name": "Ann"}),
        json!({"id": 2, "name": "Bob"}),
        json!({"id": 3, "name": "Cy"}),
    ]
}

async fn log_of(engine: &mut Engine<MockConnector>) -> Vec<String> {
    match engine.exec(":log").await.unwrap() {
        Output::Log(lines) => lines,
        other => panic!("expected log, got {:?}", other),
    }
}

#[tokio::test]
async fn test_select_rows() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(users()));

    let out = engine.exec("users WHERE active = 1").await.unwrap();
    assert_eq!(out, Output::Rows(users()));
    assert_eq!(mock.calls(), vec!["SELECT * FROM users WHERE active = 1"]);
}

#[tokio::test]
async fn test_row_selector_uses_key_map() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(vec![json!({"id": 7})]));

    let out = engine.exec("users.7").await.unwrap();
    assert_eq!(out, Output::Row(Some(json!({"id": 7}))));

    let key = engine.exec("users:key user_id").await.unwrap();
    assert_eq!(key, Output::Key("user_id".into()));
    engine.exec("users.7").await.unwrap();

    assert_eq!(
        mock.calls(),
        vec![
            "SELECT * FROM users WHERE id=7 LIMIT 1",
            "SELECT * FROM users WHERE user_id=7 LIMIT 1",
        ]
    );
}

#[tokio::test]
async fn test_key_setter_record() {
    let (mut engine, _) = engine();
    let out = engine
        .exec(Call::new(":key").arg(Record::new().set("orders", "order_id").set("bad", "")))
        .await
        .unwrap();
    match out {
        Output::Keys(keys) => {
            assert_eq!(keys.get("orders").map(String::as_str), Some("order_id"));
            assert!(!keys.contains_key("bad"));
        }
        other => panic!("expected keys, got {:?}", other),
    }
    assert_eq!(engine.keys(1).unwrap().get("orders"), "order_id");
}

#[tokio::test]
async fn test_first_without_rows() {
    let (mut engine, mock) = engine();
    let out = engine.exec("users/first WHERE id = 99").await.unwrap();
    assert_eq!(out, Output::Row(None));

    let out = engine
        .exec(Call::new("users/first WHERE id = 99").decorate("{$name}"))
        .await
        .unwrap();
    assert_eq!(out, Output::Text(String::new()));
    assert_eq!(mock.calls()[0], "SELECT * FROM users WHERE id = 99 LIMIT 1");
}

#[tokio::test]
async fn test_first_keeps_existing_limit() {
    let (mut engine, mock) = engine();
    engine.exec("users/first LIMIT 3").await.unwrap();
    assert_eq!(mock.calls(), vec!["SELECT * FROM users LIMIT 3"]);
}

#[tokio::test]
async fn test_cache_hit_skips_backend() {
    let mock = MockConnector::default();
    let mut engine = Engine::new(mock.clone()).with_cache(Cache::memory());
    engine.register(config()).unwrap();
    mock.reply(Reply::Rows(users()));

    let first = engine.exec("users/cache").await.unwrap();
    let second = engine.exec("users/cache").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(mock.calls().len(), 1);

    let log = log_of(&mut engine).await;
    assert!(log.iter().any(|l| l.starts_with("(Cache write: ")));
    assert!(log.iter().any(|l| l.starts_with("(Cache read: ")));
}

#[tokio::test]
async fn test_cache_option_without_cache() {
    let (mut engine, mock) = engine();
    let err = engine.exec("users/cache").await.unwrap_err();
    assert!(matches!(err, RapidError::Config(_)));
    assert!(mock.calls().is_empty());
}

/// Store whose entries always look fresh but whose reads and writes can fail.
struct FaultyStore {
    fresh: bool,
    fail_write: bool,
}

impl CacheStore for FaultyStore {
    fn written_at(&self, _key: &str) -> Option<SystemTime> {
        self.fresh.then(SystemTime::now)
    }

    fn read(&self, key: &str) -> RapidResult<JsonValue> {
        Err(RapidError::CacheRead(key.to_string()))
    }

    fn write(&self, key: &str, _value: &JsonValue, _now: SystemTime) -> RapidResult<()> {
        if self.fail_write {
            return Err(RapidError::cache_write(key, "disk full"));
        }
        Ok(())
    }

    fn flush(&self) -> RapidResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_cache_read_failure_is_a_miss() {
    let mock = MockConnector::default();
    let store = FaultyStore {
        fresh: true,
        fail_write: false,
    };
    let mut engine = Engine::new(mock.clone()).with_cache(Cache::new(store));
    engine.register(config()).unwrap();
    mock.reply(Reply::Rows(users()));

    assert_eq!(engine.exec("users/cache").await.unwrap(), Output::Rows(users()));
    assert_eq!(mock.calls(), vec!["SELECT * FROM users"]);

    let log = log_of(&mut engine).await;
    assert!(!log.iter().any(|l| l.starts_with("(Cache read: ")));
    assert!(log.iter().any(|l| l.starts_with("(Cache write: ")));
}

#[tokio::test]
async fn test_cache_write_failure_always_surfaces() {
    let mock = MockConnector::default();
    let store = FaultyStore {
        fresh: false,
        fail_write: true,
    };
    let mut engine = Engine::new(mock.clone()).with_cache(Cache::new(store));
    engine.register(config().surface_errors(false)).unwrap();
    mock.reply(Reply::Rows(users()));

    let err = engine.exec("users/cache").await.unwrap_err();
    assert!(matches!(err, RapidError::CacheWrite { .. }));
    assert_eq!(engine.exec(":error").await.unwrap(), Output::Bool(false));
}

#[tokio::test]
async fn test_cache_verb_sets_one_shot_expire() {
    let mock = MockConnector::default();
    let mut engine = Engine::new(mock).with_cache(Cache::memory());
    engine.register(config()).unwrap();

    assert_eq!(engine.exec(":cache 10 minutes").await.unwrap(), Output::Done);
    assert_eq!(
        engine.cache().unwrap().expire(),
        "10 minutes".parse::<rapidsql::cache::Expiry>().unwrap()
    );
    assert!(matches!(
        engine.exec(":cache whenever").await,
        Err(RapidError::InvalidExpire(_))
    ));
}

#[tokio::test]
async fn test_errors_surface_by_default() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Fail("boom"));

    let err = engine.exec("users").await.unwrap_err();
    assert!(matches!(err, RapidError::Backend(ref m) if m == "boom"));
    assert_eq!(engine.exec(":error").await.unwrap(), Output::Bool(true));
}

#[tokio::test]
async fn test_errors_swallowed() {
    let (mut engine, mock) = engine_with(config().surface_errors(false));
    mock.reply(Reply::Fail("boom"));

    assert_eq!(engine.exec("users").await.unwrap(), Output::Bool(false));
    assert_eq!(engine.exec(":error").await.unwrap(), Output::Bool(true));
    assert_eq!(
        engine.exec(":error_last").await.unwrap(),
        Output::LastError(Some("Database error: boom".into()))
    );

    let log = log_of(&mut engine).await;
    assert!(log.contains(&"Error: Database error: boom".to_string()));
}

#[tokio::test]
async fn test_error_handler_receives_message() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (mut engine, mock) = engine_with(config().on_error(move |message| {
        sink.lock().unwrap().push(message.to_string());
    }));
    mock.reply(Reply::Fail("gone away"));

    let out = engine.exec("users:del WHERE id = 1").await.unwrap();
    assert_eq!(out, Output::Bool(false));
    assert_eq!(*seen.lock().unwrap(), vec!["Database error: gone away"]);
}

#[tokio::test]
async fn test_error_handler_skipped_when_swallowing() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (mut engine, mock) = engine_with(
        config()
            .surface_errors(false)
            .on_error(move |message| sink.lock().unwrap().push(message.to_string())),
    );
    mock.reply(Reply::Fail("gone away"));

    assert_eq!(engine.exec("users").await.unwrap(), Output::Bool(false));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(
        engine.exec(":error_last").await.unwrap(),
        Output::LastError(Some("Database error: gone away".into()))
    );
}

#[tokio::test]
async fn test_swallowed_count_is_zero() {
    let (mut engine, mock) = engine_with(config().surface_errors(false));
    mock.reply(Reply::Fail("boom"));
    assert_eq!(engine.exec("users:count").await.unwrap(), Output::Count(0));

    mock.reply(Reply::Fail("boom"));
    let out = engine
        .exec(Call::new("users:count").decorate("some ?: none"))
        .await
        .unwrap();
    assert_eq!(out, Output::Text("none".into()));
}

#[tokio::test]
async fn test_grammar_errors_always_surface() {
    let (mut engine, _) = engine_with(config().surface_errors(false));
    let err = engine.exec("users:explode").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid command 'explode'");
    assert_eq!(engine.exec(":error").await.unwrap(), Output::Bool(false));
}

#[tokio::test]
async fn test_raw_param_rejected() {
    let (mut engine, mock) = engine();
    let err = engine
        .exec(Call::new("users WHERE id = :id").arg(Record::new().set("id", Value::raw("1 OR 1=1"))))
        .await
        .unwrap_err();
    assert!(matches!(err, RapidError::InvalidParam(ref name) if name == "id"));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_query_params_logged() {
    let (mut engine, mock) = engine();
    engine
        .exec(Call::new("users WHERE id = :id").arg(Record::new().set("id", 7)))
        .await
        .unwrap();

    let log = log_of(&mut engine).await;
    assert!(log.contains(&"Query: SELECT * FROM users WHERE id = :id".to_string()));
    assert!(log.contains(&"(Query params: id => 7)".to_string()));
    assert_eq!(mock.params(), vec![Params::from(Record::new().set("id", 7))]);
}

#[tokio::test]
async fn test_pagination_end_to_end() {
    let (mut engine, mock) = engine();
    let state = engine
        .exec(Call::new(":pagination").arg(Record::new().set("rpp", 2).set("page", 2)))
        .await
        .unwrap();
    match state {
        Output::Pagination(state) => assert_eq!((state.rpp(), state.page()), (2, 2)),
        other => panic!("expected pagination, got {:?}", other),
    }

    mock.reply(Reply::Rows(users()));
    match engine.exec("users/pagination").await.unwrap() {
        Output::Paged { pagination, rows } => {
            assert_eq!(rows.len(), 2);
            assert_eq!(pagination.next, 3);
            assert_eq!(pagination.prev, 1);
            assert_eq!(pagination.offset, 2);
        }
        other => panic!("expected page, got {:?}", other),
    }
    assert_eq!(mock.calls(), vec!["SELECT * FROM users LIMIT 2, 3"]);
}

#[tokio::test]
async fn test_pagination_conflicts_with_limit() {
    let (mut engine, mock) = engine();
    let err = engine.exec("users/pagination LIMIT 5").await.unwrap_err();
    assert!(matches!(err, RapidError::PaginationConflict));

    let err = engine.exec(":query/pagination DELETE FROM users").await.unwrap_err();
    assert!(matches!(err, RapidError::PaginationNotSelect));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_manual_query_pagination() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(users()));
    match engine.exec(":query/pagination SELECT * FROM users;").await.unwrap() {
        Output::Paged { pagination, rows } => {
            assert_eq!(rows.len(), 3);
            assert_eq!(pagination.next, 0);
        }
        other => panic!("expected page, got {:?}", other),
    }
    assert_eq!(mock.calls(), vec!["SELECT * FROM users LIMIT 0, 11"]);
}

#[tokio::test]
async fn test_model_descriptor() {
    let (mut engine, mock) = engine();
    match engine.exec("users(id, name)/model WHERE active = 1").await.unwrap() {
        Output::Model(model) => {
            assert_eq!(model.table, "users");
            assert_eq!(model.key, "id");
            assert_eq!(model.columns, vec!["id", "name"]);
            assert_eq!(model.clause, "WHERE id=:id AND active = 1");
        }
        other => panic!("expected model, got {:?}", other),
    }

    let err = engine.exec("users/model LIMIT 1").await.unwrap_err();
    assert!(matches!(err, RapidError::ModelLimit));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_query_option_returns_sql() {
    let (mut engine, mock) = engine();
    let out = engine
        .exec(Call::new("users:add/query").arg(Record::new().set("name", "Shay")))
        .await
        .unwrap();
    assert_eq!(out, Output::Sql("INSERT INTO users(name) VALUES(:name)".into()));

    let out = engine.exec("users/pagination/query").await.unwrap();
    assert_eq!(out, Output::Sql("SELECT * FROM users LIMIT 0, 11".into()));

    let out = engine.exec(":query/query SELECT 1").await.unwrap();
    assert_eq!(out, Output::Sql("SELECT 1".into()));

    assert!(mock.calls().is_empty());
    assert_eq!(mock.connects(), 0);
}

#[tokio::test]
async fn test_count_and_exists() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(vec![json!({"count": 5})]));
    assert_eq!(
        engine.exec("users:count WHERE active = 1").await.unwrap(),
        Output::Count(5)
    );
    assert_eq!(engine.exec("users:count").await.unwrap(), Output::Count(0));

    mock.reply(Reply::Rows(vec![json!({"is_set": 1})]));
    assert_eq!(
        engine.exec("users:exists WHERE id = 2").await.unwrap(),
        Output::Bool(true)
    );
    mock.reply(Reply::Rows(vec![json!({"is_set": 0})]));
    assert_eq!(
        engine.exec("users:exists WHERE id = 3").await.unwrap(),
        Output::Bool(false)
    );
}

#[tokio::test]
async fn test_columns_and_tables_flatten() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(vec![
        json!({"Field": "id", "Type": "int"}),
        json!({"Field": "name", "Type": "varchar(40)"}),
    ]));
    mock.reply(Reply::Rows(vec![
        json!({"Tables_in_app": "orders"}),
        json!({"Tables_in_app": "users"}),
    ]));

    assert_eq!(
        engine.exec("users:columns").await.unwrap(),
        Output::Names(vec!["id".into(), "name".into()])
    );
    assert_eq!(
        engine.exec(":tables").await.unwrap(),
        Output::Names(vec!["orders".into(), "users".into()])
    );
}

#[tokio::test]
async fn test_insert_and_last_id() {
    let (mut engine, mock) = engine();
    mock.0.lock().unwrap().last_insert_id = 42;
    mock.reply(Reply::Affected(1));

    let out = engine
        .exec(Call::new("users:add").arg(Record::new().set("name", "Shay")))
        .await
        .unwrap();
    assert_eq!(out, Output::Affected(1));
    assert_eq!(engine.exec(":id").await.unwrap(), Output::Id(42));
    assert_eq!(mock.calls(), vec!["INSERT INTO users(name) VALUES(:name)"]);
}

#[tokio::test]
async fn test_truncate_and_call() {
    let (mut engine, mock) = engine();
    assert_eq!(engine.exec("logs:truncate").await.unwrap(), Output::Done);

    mock.reply(Reply::Rows(vec![json!({"total": 9})]));
    let out = engine
        .exec(Call::new(":call_rows sp_report").arg(vec![Value::Int(2024)]))
        .await
        .unwrap();
    assert_eq!(out, Output::Rows(vec![json!({"total": 9})]));
    assert_eq!(mock.calls(), vec!["TRUNCATE logs", "CALL sp_report(?)"]);
}

#[tokio::test]
async fn test_log_handler_runs_unlogged() {
    let (mut engine, mock) = engine();
    let out = engine
        .exec(Call::new("logs:log_handler").arg(Record::new().set("message", "hi")))
        .await
        .unwrap();
    assert_eq!(out, Output::Done);
    assert_eq!(mock.calls(), vec!["INSERT INTO logs(message) VALUES(:message)"]);

    engine.exec("users").await.unwrap();
    let log = log_of(&mut engine).await;
    assert!(!log.iter().any(|l| l.contains("INSERT INTO logs")));
    assert!(log.contains(&"Query: SELECT * FROM users".to_string()));

    let out = engine
        .exec(Call::new("[5]logs:log_handler").arg(Record::new().set("message", "hi")))
        .await
        .unwrap();
    assert_eq!(out, Output::Done);
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_transactions() {
    let (mut engine, mock) = engine();
    assert_eq!(engine.exec(":transaction").await.unwrap(), Output::Bool(true));
    assert_eq!(engine.exec(":commit").await.unwrap(), Output::Bool(true));
    assert_eq!(engine.exec(":rollback").await.unwrap(), Output::Bool(true));
    assert_eq!(mock.0.lock().unwrap().tx, vec!["begin", "commit", "rollback"]);
}

#[tokio::test]
async fn test_array_rows_stay_keyed() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(users()));
    assert_eq!(engine.exec("users/array").await.unwrap(), Output::Rows(users()));

    mock.reply(Reply::Rows(users()));
    let out = engine
        .exec(Call::new("users/array").decorate("{$name};"))
        .await
        .unwrap();
    assert_eq!(out, Output::Text("Ann;Bob;Cy;".into()));

    let (mut engine, mock) = engine_with(config().object_results(false));
    mock.reply(Reply::Rows(vec![json!({"count": 4})]));
    assert_eq!(engine.exec("users:count").await.unwrap(), Output::Count(4));
}

#[tokio::test]
async fn test_decoration() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Rows(users()));
    let out = engine
        .exec(
            Call::new("users")
                .decorate("{$:key}.{$name:upper};")
                .filter("upper", |v| v.as_str().unwrap_or_default().to_uppercase()),
        )
        .await
        .unwrap();
    assert_eq!(out, Output::Text("0.ANN;1.BOB;2.CY;".into()));

    mock.reply(Reply::Affected(0));
    let out = engine
        .exec(Call::new("users:del WHERE id = 9").decorate("deleted ?: nothing to delete"))
        .await
        .unwrap();
    assert_eq!(out, Output::Text("nothing to delete".into()));
}

#[tokio::test]
async fn test_manual_query_decoration_detects_mode() {
    let (mut engine, mock) = engine();
    mock.reply(Reply::Affected(3));
    let out = engine
        .exec(Call::new(":query UPDATE t SET a = 1").decorate("{$} rows updated"))
        .await
        .unwrap();
    assert_eq!(out, Output::Text("3 rows updated".into()));

    mock.reply(Reply::Affected(0));
    let out = engine
        .exec(Call::new(":query UPDATE t SET a = 1").decorate("updated ?: unchanged"))
        .await
        .unwrap();
    assert_eq!(out, Output::Text("unchanged".into()));

    mock.reply(Reply::Rows(users()));
    let out = engine
        .exec(Call::new(":query SELECT * FROM users").decorate("{$id} "))
        .await
        .unwrap();
    assert_eq!(out, Output::Text("1 2 3 ".into()));
}

#[tokio::test]
async fn test_undecorated_verbs() {
    let (mut engine, _) = engine();
    let out = engine
        .exec(Call::new("logs:truncate").decorate("{$}"))
        .await
        .unwrap();
    assert_eq!(out, Output::Done);

    let out = engine
        .exec(Call::new(":transaction").decorate("began ?: failed"))
        .await
        .unwrap();
    assert_eq!(out, Output::Bool(true));
}

#[tokio::test]
async fn test_unknown_connection() {
    let (mut engine, mock) = engine();
    let err = engine.exec("[9]users").await.unwrap_err();
    assert!(matches!(err, RapidError::UnknownConnection(9)));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_lazy_connect() {
    let (mut engine, mock) = engine();
    assert_eq!(mock.connects(), 0);
    engine.exec("users").await.unwrap();
    engine.exec("orders").await.unwrap();
    assert_eq!(mock.connects(), 1);
    assert!(engine.registry().get(1).unwrap().is_connected());
}

#[tokio::test]
async fn test_connect_failure_recorded() {
    let (mut engine, mock) = engine_with(config().surface_errors(false));
    mock.0.lock().unwrap().fail_connect = true;
    assert_eq!(engine.exec("users").await.unwrap(), Output::Bool(false));
    assert_eq!(
        engine.exec(":error_last").await.unwrap(),
        Output::LastError(Some("Connection error: refused".into()))
    );
}

#[tokio::test]
async fn test_debug_snapshot() {
    let mock = MockConnector::default();
    let mut engine = Engine::new(mock);
    engine.register(config()).unwrap();
    engine.register(config().id(4).logging(false)).unwrap();

    match engine.exec(":debug").await.unwrap() {
        Output::Debug(connections) => {
            assert_eq!(connections.len(), 2);
            assert_eq!(connections[0].id, 1);
            assert_eq!(connections[0].log.len(), 1);
            assert!(connections[1].log.is_empty());
        }
        other => panic!("expected debug, got {:?}", other),
    }
}
