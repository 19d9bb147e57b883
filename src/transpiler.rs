//! SQL compiler.
//!
//! Converts parsed commands into parameterized SQL statements.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::*;
use crate::error::{RapidError, RapidResult};
use crate::options::Resolved;
use crate::value::{Params, Record, Value};

static ROWS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(select|show|describe|optimize|pragma|repair)\b").expect("valid regex")
});

static AFFECTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(delete|insert|update)\b").expect("valid regex"));

/// How the result of a statement is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Fetch rows
    Rows,
    /// Count affected rows
    Affected,
    /// Decide from the leading SQL keyword
    Infer,
}

/// Result shape after inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rows,
    Affected,
    Done,
}

impl QueryKind {
    pub fn shape(self, sql: &str) -> Shape {
        match self {
            QueryKind::Rows => Shape::Rows,
            QueryKind::Affected => Shape::Affected,
            QueryKind::Infer if ROWS_RE.is_match(sql) => Shape::Rows,
            QueryKind::Infer if AFFECTED_RE.is_match(sql) => Shape::Affected,
            QueryKind::Infer => Shape::Done,
        }
    }
}

/// A compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
    pub kind: QueryKind,
}

impl Statement {
    fn new(sql: String, params: Params, kind: QueryKind) -> Self {
        Self { sql, params, kind }
    }
}

/// Trait for compiling commands to SQL.
pub trait ToSql {
    /// Compile with resolved options and the caller's positional arguments.
    fn to_sql(&self, options: &Resolved, args: &[Params]) -> RapidResult<Statement>;
}

impl ToSql for Command {
    fn to_sql(&self, options: &Resolved, args: &[Params]) -> RapidResult<Statement> {
        let needs_table = self.verb.map_or(true, |v| v.needs_table());
        if needs_table && self.table.is_empty() {
            let name = self.verb.map_or_else(|| "select".to_string(), |v| v.to_string());
            return Err(RapidError::MissingTable(name));
        }

        match self.verb {
            None => Ok(self.to_select_sql(options, args)),
            Some(Verb::Insert | Verb::Replace | Verb::LogHandler) => self.to_insert_sql(options, args),
            Some(Verb::Update) => self.to_update_sql(options, args),
            Some(Verb::Delete) => Ok(Statement::new(
                format!("DELETE{} FROM {}{}", options.modifier_sql(), self.table, self.clause_sql()),
                first_params(args),
                QueryKind::Affected,
            )),
            Some(verb @ (Verb::Call | Verb::CallAffected | Verb::CallRows)) => {
                Ok(self.to_call_sql(verb, args))
            }
            Some(Verb::Count) => Ok(Statement::new(
                format!("SELECT COUNT(1) AS count FROM {}{}", self.table, self.clause_sql()),
                first_params(args),
                QueryKind::Rows,
            )),
            Some(Verb::Exists) => Ok(Statement::new(
                format!(
                    "SELECT EXISTS(SELECT 1 FROM {}{}) AS is_set",
                    self.table,
                    self.clause_sql()
                ),
                first_params(args),
                QueryKind::Rows,
            )),
            Some(Verb::Columns) => Ok(Statement::new(
                format!("SHOW COLUMNS FROM {}", self.table),
                Params::None,
                QueryKind::Rows,
            )),
            Some(Verb::Tables) => Ok(Statement::new(
                "SHOW TABLES".to_string(),
                Params::None,
                QueryKind::Rows,
            )),
            Some(Verb::Truncate) => Ok(Statement::new(
                format!("TRUNCATE {}", self.table),
                Params::None,
                QueryKind::Infer,
            )),
            Some(Verb::Query) => {
                if self.clause.is_empty() {
                    return Err(RapidError::parse(0, "Command 'query' requires SQL"));
                }
                Ok(Statement::new(
                    self.clause.clone(),
                    first_params(args),
                    QueryKind::Infer,
                ))
            }
            Some(other) => Err(RapidError::NotSql(other.to_string())),
        }
    }
}

impl Command {
    /// Generate SELECT SQL.
    fn to_select_sql(&self, options: &Resolved, args: &[Params]) -> Statement {
        Statement::new(
            format!(
                "SELECT{} {} FROM {}{}",
                options.modifier_sql(),
                self.columns,
                self.table,
                self.clause_sql()
            ),
            first_params(args),
            QueryKind::Rows,
        )
    }

    /// Generate INSERT/REPLACE SQL.
    fn to_insert_sql(&self, options: &Resolved, args: &[Params]) -> RapidResult<Statement> {
        let record = keyed_record(args.first(), "Insert")?;

        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut params = Record::new();
        for (column, value) in record.iter() {
            match value {
                Value::Raw(sql) if sql.is_empty() => continue,
                Value::Raw(sql) => values.push(sql.clone()),
                value => {
                    values.push(format!(":{}", column));
                    params.insert(column, value.clone());
                }
            }
            columns.push(column);
        }

        let keyword = if self.verb == Some(Verb::Replace) {
            "REPLACE"
        } else {
            "INSERT"
        };
        let sql = format!(
            "{}{} INTO {}({}) VALUES({})",
            keyword,
            options.modifier_sql(),
            self.table,
            columns.join(", "),
            values.join(", ")
        );
        Ok(Statement::new(sql, named(params), QueryKind::Affected))
    }

    /// Generate UPDATE SQL.
    fn to_update_sql(&self, options: &Resolved, args: &[Params]) -> RapidResult<Statement> {
        let record = keyed_record(args.first(), "Update")?;

        let mut sets = Vec::new();
        let mut params = Record::new();
        for (column, value) in record.iter() {
            match value {
                Value::Raw(sql) if sql.is_empty() => {}
                Value::Raw(sql) => sets.push(format!("{} = {}", column, sql)),
                value => {
                    sets.push(format!("{} = :{}", column, column));
                    params.insert(column, value.clone());
                }
            }
        }

        let params = match args.get(1) {
            None | Some(Params::None) => named(params),
            Some(Params::Named(extra)) => {
                params.merge(extra);
                named(params)
            }
            Some(Params::Positional(values)) if params.is_empty() => {
                Params::Positional(values.clone())
            }
            Some(Params::Positional(_)) => return Err(RapidError::MixedParams),
        };

        let sql = format!(
            "UPDATE{} {} SET {}{}",
            options.modifier_sql(),
            self.table,
            sets.join(", "),
            self.clause_sql()
        );
        Ok(Statement::new(sql, params, QueryKind::Affected))
    }

    /// Generate CALL SQL with positional placeholders.
    fn to_call_sql(&self, verb: Verb, args: &[Params]) -> Statement {
        let mut placeholders = Vec::new();
        let mut values = Vec::new();
        for value in first_params(args).values() {
            match value {
                Value::Raw(sql) if sql.is_empty() => {}
                Value::Raw(sql) => placeholders.push(sql.clone()),
                value => {
                    placeholders.push("?".to_string());
                    values.push(value.clone());
                }
            }
        }

        let kind = match verb {
            Verb::CallAffected => QueryKind::Affected,
            Verb::CallRows => QueryKind::Rows,
            _ => QueryKind::Infer,
        };
        let params = if values.is_empty() {
            Params::None
        } else {
            Params::Positional(values)
        };
        Statement::new(
            format!("CALL{}({})", self.clause_sql(), placeholders.join(", ")),
            params,
            kind,
        )
    }
}

fn first_params(args: &[Params]) -> Params {
    args.first().cloned().unwrap_or_default()
}

fn named(record: Record) -> Params {
    if record.is_empty() {
        Params::None
    } else {
        Params::Named(record)
    }
}

fn keyed_record<'a>(params: Option<&'a Params>, verb: &'static str) -> RapidResult<&'a Record> {
    params
        .and_then(Params::as_record)
        .filter(|r| !r.is_empty())
        .ok_or(RapidError::MissingColumns { verb })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::resolve;
    use crate::parser::{parse, tokenize};
    use crate::registry::KeyMap;
    use pretty_assertions::assert_eq;

    fn compile(input: &str, args: &[Params]) -> RapidResult<Statement> {
        let cmd = tokenize(input, &KeyMap::default())?;
        cmd.to_sql(&resolve(&cmd.option_tokens), args)
    }

    fn sql(input: &str, args: &[Params]) -> String {
        compile(input, args).unwrap().sql
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(sql("users", &[]), "SELECT * FROM users");
        assert_eq!(
            sql("users(id, email) WHERE active = 1", &[]),
            "SELECT id, email FROM users WHERE active = 1"
        );
    }

    #[test]
    fn test_select_modifiers() {
        assert_eq!(
            sql("users/distinct/sql_no_cache", &[]),
            "SELECT DISTINCT SQL_NO_CACHE * FROM users"
        );
    }

    #[test]
    fn test_select_row() {
        let stmt = compile("users.7", &[]).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE id=7");
        assert_eq!(stmt.kind, QueryKind::Rows);
    }

    #[test]
    fn test_insert_ignore() {
        let record = Record::new().set("name", "Shay").set("email", "s@x.io");
        let stmt = compile("users:add/ignore", &[record.into()]).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT IGNORE INTO users(name, email) VALUES(:name, :email)"
        );
        assert_eq!(stmt.kind, QueryKind::Affected);
        assert_eq!(stmt.params.values().len(), 2);
    }

    #[test]
    fn test_insert_raw_sql_is_inlined() {
        let record = Record::new()
            .set("name", "x")
            .set("created", Value::raw("NOW()"))
            .set("skipped", Value::raw(""));
        let stmt = compile("users:replace", &[record.into()]).unwrap();
        assert_eq!(
            stmt.sql,
            "REPLACE INTO users(name, created) VALUES(:name, NOW())"
        );
        assert_eq!(
            stmt.params,
            Params::Named(Record::new().set("name", "x"))
        );
    }

    #[test]
    fn test_insert_requires_record() {
        let err = compile("users:add", &[vec![Value::Int(1)].into()]).unwrap_err();
        assert!(matches!(err, RapidError::MissingColumns { .. }));
        assert!(matches!(
            compile("users:add", &[]),
            Err(RapidError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_update() {
        let set = Record::new()
            .set("title", "t")
            .set("updated", Value::raw("NOW()"));
        let filter = Record::new().set("id", 3);
        let stmt = compile("docs:mod WHERE id = :id", &[set.into(), filter.into()]).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE docs SET title = :title, updated = NOW() WHERE id = :id"
        );
        assert_eq!(
            stmt.params,
            Params::Named(Record::new().set("title", "t").set("id", 3))
        );
    }

    #[test]
    fn test_update_requires_record() {
        let err = compile("docs:update", &[vec![Value::Int(1)].into()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Update failed: columns and values must be a keyed record"
        );
    }

    #[test]
    fn test_update_mixed_params() {
        let set = Record::new().set("title", "t");
        let err = compile("docs:mod WHERE id = ?", &[set.into(), vec![Value::Int(1)].into()])
            .unwrap_err();
        assert!(matches!(err, RapidError::MixedParams));
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            sql("logs:del/low_priority WHERE ts < NOW()", &[]),
            "DELETE LOW_PRIORITY FROM logs WHERE ts < NOW()"
        );
    }

    #[test]
    fn test_call() {
        let args = vec![Value::Int(5), Value::raw("@out"), Value::Text("a".into())];
        let stmt = compile(":call_rows sp_find", &[args.into()]).unwrap();
        assert_eq!(stmt.sql, "CALL sp_find(?, @out, ?)");
        assert_eq!(stmt.kind, QueryKind::Rows);
        assert_eq!(
            stmt.params,
            Params::Positional(vec![Value::Int(5), Value::Text("a".into())])
        );

        let stmt = compile(":call sp_noop", &[]).unwrap();
        assert_eq!(stmt.sql, "CALL sp_noop()");
        assert_eq!(stmt.kind.shape(&stmt.sql), Shape::Done);
    }

    #[test]
    fn test_count_exists() {
        assert_eq!(
            sql("users:count WHERE active = 1", &[]),
            "SELECT COUNT(1) AS count FROM users WHERE active = 1"
        );
        assert_eq!(
            sql("users:exists WHERE id = 2", &[]),
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = 2) AS is_set"
        );
    }

    #[test]
    fn test_introspection() {
        assert_eq!(sql("users:columns", &[]), "SHOW COLUMNS FROM users");
        assert_eq!(sql(":tables", &[]), "SHOW TABLES");
        assert_eq!(sql("users:truncate", &[]), "TRUNCATE users");
    }

    #[test]
    fn test_query_verbatim() {
        let stmt = compile(":query UPDATE t SET a = 1", &[]).unwrap();
        assert_eq!(stmt.sql, "UPDATE t SET a = 1");
        assert_eq!(stmt.kind.shape(&stmt.sql), Shape::Affected);
    }

    #[test]
    fn test_missing_table() {
        assert!(matches!(
            compile(":count", &[]),
            Err(RapidError::MissingTable(v)) if v == "count"
        ));
    }

    #[test]
    fn test_non_sql_verb() {
        let cmd = parse("users:key").unwrap();
        assert!(matches!(
            cmd.to_sql(&Resolved::default(), &[]),
            Err(RapidError::NotSql(_))
        ));
    }

    #[test]
    fn test_shape_inference() {
        assert_eq!(QueryKind::Infer.shape("  select 1"), Shape::Rows);
        assert_eq!(QueryKind::Infer.shape("SHOW TABLES"), Shape::Rows);
        assert_eq!(QueryKind::Infer.shape("insert into t values(1)"), Shape::Affected);
        assert_eq!(QueryKind::Infer.shape("TRUNCATE t"), Shape::Done);
        assert_eq!(QueryKind::Rows.shape("CALL sp()"), Shape::Rows);
    }

    /// Every SQL-producing verb compiles to a statement starting with its keyword.
    #[test]
    fn test_round_trip_per_verb() {
        let record = || Params::from(Record::new().set("a", 1));
        let cases: Vec<(&str, Vec<Params>, &str)> = vec![
            ("t", vec![], "SELECT"),
            ("t.1", vec![], "SELECT"),
            ("t:add", vec![record()], "INSERT"),
            ("t:insert", vec![record()], "INSERT"),
            ("t:replace", vec![record()], "REPLACE"),
            ("t:log_handler", vec![record()], "INSERT"),
            ("t:mod", vec![record()], "UPDATE"),
            ("t:update", vec![record()], "UPDATE"),
            ("t:del", vec![], "DELETE"),
            ("t:delete", vec![], "DELETE"),
            (":call sp", vec![], "CALL"),
            (":call_affected sp", vec![], "CALL"),
            (":call_rows sp", vec![], "CALL"),
            ("t:count", vec![], "SELECT COUNT"),
            ("t:exists", vec![], "SELECT EXISTS"),
            ("t:columns", vec![], "SHOW COLUMNS"),
            (":tables", vec![], "SHOW TABLES"),
            ("t:truncate", vec![], "TRUNCATE"),
            (":query SELECT 1", vec![], "SELECT"),
        ];
        for (input, args, keyword) in cases {
            let stmt = compile(input, &args).unwrap();
            assert!(
                stmt.sql.starts_with(keyword),
                "{} compiled to {}",
                input,
                stmt.sql
            );
            let opens = stmt.sql.matches('(').count();
            assert_eq!(opens, stmt.sql.matches(')').count(), "{}", stmt.sql);
        }
    }
}
