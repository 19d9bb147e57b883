//! Command tokenizer using nom.
//!
//! # Syntax Overview
//!
//! ```text
//! [2]users(id, email):add/ignore WHERE ...
//! ─┬─ ─┬── ─────┬──── ─┬─ ───┬── ────┬────
//!  │   │        │      │     │       │
//!  │   │        │      │     │       └── Clause (raw SQL, appended as-is)
//!  │   │        │      │     └── Options (known flags or SQL modifiers)
//!  │   │        │      └── Verb (`:add`) or row selector (`.7`)
//!  │   │        └── Columns (default `*`)
//!  │   └── Table
//!  └── Connection id (default 1)
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1, multispace1, one_of},
    combinator::{eof, map, opt, peek, value},
    sequence::{delimited, preceded, terminated},
};

use crate::ast::*;
use crate::backend::quote_literal;
use crate::error::{RapidError, RapidResult};
use crate::registry::KeyMap;

/// What follows the table and columns: a verb or a row selector.
#[derive(Debug, Clone, PartialEq)]
enum Selector<'a> {
    Verb(&'a str),
    Row(&'a str),
}

/// Parse a complete command string.
///
/// An empty string yields the default command.
pub fn parse(input: &str) -> RapidResult<Command> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Command::default());
    }

    let (rest, conn) = parse_connection_id(input).map_err(|e| nom_error(input, e))?;
    if conn.is_none() && rest.starts_with('[') {
        return Err(RapidError::parse(0, "Connection id must be digits: '[1]'"));
    }
    let connection_id = match conn {
        Some(digits) => digits
            .parse::<ConnectionId>()
            .map_err(|_| RapidError::parse(1, format!("Connection id '{}' out of range", digits)))?,
        None => DEFAULT_CONNECTION,
    };

    let (rest, table) = parse_table(rest).map_err(|e| nom_error(input, e))?;
    let (rest, columns) = parse_columns(rest).map_err(|e| nom_error(input, e))?;
    let (rest, selector) = parse_selector(rest).map_err(|e| nom_error(input, e))?;
    let (rest, options) = parse_options(rest).map_err(|e| nom_error(input, e))?;

    let (verb, row_id) = match selector {
        Some(Selector::Verb(name)) => (Some(name.parse::<Verb>()?), None),
        Some(Selector::Row(id)) => (None, Some(id.to_string())),
        None => (None, None),
    };

    Ok(Command {
        connection_id,
        table: table.unwrap_or_default().to_string(),
        columns,
        row_id,
        verb,
        option_tokens: options,
        clause: rest.trim().to_string(),
    })
}

/// Parse a command string and inject the row selector predicate, resolving
/// the primary key column through `keys`.
///
/// ```
/// use rapidsql::parser::tokenize;
/// use rapidsql::registry::KeyMap;
///
/// let cmd = tokenize("[2]users.7", &KeyMap::default()).unwrap();
/// assert_eq!(cmd.connection_id, 2);
/// assert_eq!(cmd.clause, "WHERE id=7");
/// ```
pub fn tokenize(input: &str, keys: &KeyMap) -> RapidResult<Command> {
    let mut cmd = parse(input)?;
    if let Some(id) = cmd.row_id.clone() {
        if !cmd.table.is_empty() {
            let key = keys.get(&cmd.table).to_string();
            cmd.scope_to_row(&key, &quote_literal(&id));
        }
    }
    Ok(cmd)
}

fn nom_error(input: &str, e: nom::Err<nom::error::Error<&str>>) -> RapidError {
    match e {
        nom::Err::Error(inner) | nom::Err::Failure(inner) => RapidError::parse(
            input.len() - inner.input.len(),
            format!("Parse failed: {:?}", inner.code),
        ),
        nom::Err::Incomplete(_) => RapidError::parse(input.len(), "Incomplete input"),
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse an identifier (table, column, verb, option).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(is_word)(input)
}

/// Parse the connection id `[N]`.
fn parse_connection_id(input: &str) -> IResult<&str, Option<&str>> {
    opt(delimited(char('['), digit1, char(']')))(input)
}

/// Parse the table, which must be followed by `:` `.` `/` `(`, whitespace or
/// the end of input.
fn parse_table(input: &str) -> IResult<&str, Option<&str>> {
    opt(terminated(
        parse_identifier,
        peek(alt((
            value((), one_of(":./(")),
            value((), multispace1),
            value((), eof),
        ))),
    ))(input)
}

/// Parse the column list `(c1, c2)`.
fn parse_columns(input: &str) -> IResult<&str, Columns> {
    map(
        opt(delimited(
            char('('),
            take_while1(|c: char| is_word(c) || c == ',' || c.is_whitespace()),
            char(')'),
        )),
        |cols: Option<&str>| match cols {
            Some(list) => {
                let names: Vec<String> = list
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                if names.is_empty() {
                    Columns::All
                } else {
                    Columns::Named(names)
                }
            }
            None => Columns::All,
        },
    )(input)
}

/// Parse `:verb` or `.id`.
fn parse_selector(input: &str) -> IResult<&str, Option<Selector<'_>>> {
    opt(alt((
        map(preceded(char(':'), parse_identifier), Selector::Verb),
        map(preceded(char('.'), digit1), Selector::Row),
    )))(input)
}

/// Parse contiguous `/opt1/opt2` tokens.
fn parse_options(input: &str) -> IResult<&str, Vec<String>> {
    map(
        opt(preceded(
            char('/'),
            take_while1(|c: char| is_word(c) || c == '/'),
        )),
        |opts: Option<&str>| {
            opts.map(|s| {
                s.split('/')
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
        },
    )(input)
}
