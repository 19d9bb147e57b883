//! MySQL backend over sqlx.
//!
//! One `MySqlConnection` per registered connection, opened on first use.

use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Executor, Row as _, TypeInfo};

use crate::backend::{Backend, Connector, Row, bind_named};
use crate::error::{RapidError, RapidResult};
use crate::registry::ConnectionConfig;
use crate::value::{Params, Value};

const DEFAULT_PORT: u16 = 3306;

/// Opens [`MySqlBackend`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl Connector for MySqlConnector {
    type Backend = MySqlBackend;

    async fn connect(&self, config: &ConnectionConfig) -> RapidResult<MySqlBackend> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port.unwrap_or(DEFAULT_PORT))
            .database(&config.database)
            .username(&config.user)
            .password(&config.password);

        let conn = options
            .connect()
            .await
            .map_err(|e| RapidError::Connection(e.to_string()))?;

        tracing::info!(host = %config.host, database = %config.database, "connected");
        Ok(MySqlBackend {
            conn,
            last_insert_id: 0,
        })
    }
}

/// An open MySQL connection.
pub struct MySqlBackend {
    conn: MySqlConnection,
    last_insert_id: u64,
}

impl Backend for MySqlBackend {
    async fn fetch(&mut self, sql: &str, params: &Params) -> RapidResult<Vec<Row>> {
        let (sql, values) = bind_named(sql, params)?;
        let query = bind_all(sqlx::query(&sql), values);

        let rows: Vec<MySqlRow> = query
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| RapidError::Backend(e.to_string()))?;

        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn execute(&mut self, sql: &str, params: &Params) -> RapidResult<u64> {
        let (sql, values) = bind_named(sql, params)?;
        let query = bind_all(sqlx::query(&sql), values);

        let result = query
            .execute(&mut self.conn)
            .await
            .map_err(|e| RapidError::Backend(e.to_string()))?;

        if result.last_insert_id() > 0 {
            self.last_insert_id = result.last_insert_id();
        }
        Ok(result.rows_affected())
    }

    async fn last_insert_id(&mut self) -> RapidResult<u64> {
        Ok(self.last_insert_id)
    }

    async fn begin(&mut self) -> RapidResult<()> {
        self.simple("START TRANSACTION").await
    }

    async fn commit(&mut self) -> RapidResult<()> {
        self.simple("COMMIT").await
    }

    async fn rollback(&mut self) -> RapidResult<()> {
        self.simple("ROLLBACK").await
    }
}

impl MySqlBackend {
    /// Run a statement over the text protocol.
    async fn simple(&mut self, sql: &str) -> RapidResult<()> {
        self.conn
            .execute(sql)
            .await
            .map_err(|e| RapidError::Backend(e.to_string()))?;
        Ok(())
    }
}

fn bind_all(
    mut query: Query<'_, MySql, MySqlArguments>,
    values: Vec<Value>,
) -> Query<'_, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::Text(v) | Value::Raw(v) => query.bind(v),
        };
    }
    query
}

/// Convert a MySQL row to a column-ordered map.
fn row_to_map(row: &MySqlRow) -> Row {
    let mut map = Row::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value: serde_json::Value = match type_name {
            "NULL" => serde_json::Value::Null,
            "BOOLEAN" => row
                .try_get::<Option<bool>, _>(i)
                .ok()
                .flatten()
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null),
            t if t.ends_with("UNSIGNED") => row
                .try_get::<Option<u64>, _>(i)
                .ok()
                .flatten()
                .map(|v| serde_json::Value::Number(v.into()))
                .unwrap_or(serde_json::Value::Null),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
                .try_get::<Option<i64>, _>(i)
                .ok()
                .flatten()
                .map(|v| serde_json::Value::Number(v.into()))
                .unwrap_or(serde_json::Value::Null),
            "FLOAT" | "DOUBLE" => row
                .try_get::<Option<f64>, _>(i)
                .ok()
                .flatten()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            "DATE" => row
                .try_get::<Option<chrono::NaiveDate>, _>(i)
                .ok()
                .flatten()
                .map(|v| serde_json::Value::String(v.to_string()))
                .unwrap_or(serde_json::Value::Null),
            "TIME" => row
                .try_get::<Option<chrono::NaiveTime>, _>(i)
                .ok()
                .flatten()
                .map(|v| serde_json::Value::String(v.to_string()))
                .unwrap_or(serde_json::Value::Null),
            "DATETIME" | "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(i)
                .ok()
                .flatten()
                .map(|v| serde_json::Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(serde_json::Value::Null),
            _ => text_value(row, i),
        };

        map.insert(name, value);
    }

    map
}

/// Text columns, decimals and anything else: UTF-8 text, or lossy bytes.
fn text_value(row: &MySqlRow, i: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null);
    }
    row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
        .ok()
        .flatten()
        .map(|bytes| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        .unwrap_or(serde_json::Value::Null)
}
