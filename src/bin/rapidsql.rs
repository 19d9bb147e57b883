//! rapidsql: run command strings against MySQL
//!
//! # Usage
//!
//! ```bash
//! # Select rows
//! rapidsql "users(id, email) WHERE active = :active" --bind active=1
//!
//! # Dry run (show SQL only)
//! rapidsql "users:add/ignore" --set name=Shay --dry-run
//!
//! # Single row by primary key, as JSON
//! rapidsql "[2]orders.42" --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use rapidsql::prelude::*;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rapidsql")]
#[command(version)]
#[command(about = "Compile and run compact SQL command strings", long_about = None)]
#[command(after_help = "EXAMPLES:
    rapidsql 'users WHERE active = 1'
    rapidsql 'users.7' --format json
    rapidsql 'users:mod WHERE id = :id' --set name=Shay --bind id=7
    rapidsql ':call_rows sp_report' --arg 2024 --arg sql:@total")]
struct Cli {
    /// The command string to execute
    command: Option<String>,

    /// Don't execute, just show the generated SQL
    #[arg(short, long)]
    dry_run: bool,

    /// Column values for add/mod (name=value)
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Named parameters (name=value)
    #[arg(short, long, value_name = "NAME=VALUE")]
    bind: Vec<String>,

    /// Positional parameters
    #[arg(short, long, value_name = "VALUE")]
    arg: Vec<String>,

    /// Decorate the result with a template, e.g. '{$id}: {$name}\n'
    #[arg(long)]
    decorate: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Configuration file
    #[arg(short, long, env = "RAPIDSQL_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and explain a command string
    Explain {
        /// The command string to explain
        command: String,
    },
    /// Show the verb and option reference
    Verbs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.subcommand {
        Some(Commands::Explain { command }) => explain(command, &cli),
        Some(Commands::Verbs) => {
            show_verbs();
            Ok(())
        }
        None => match &cli.command {
            Some(command) => execute(command, &cli).await,
            None => {
                println!("{}", "rapidsql".cyan().bold());
                println!();
                println!("Usage: rapidsql <COMMAND> [OPTIONS]");
                println!();
                println!("Try: rapidsql --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rapidsql=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Positional arguments: column values, then named or positional params.
fn build_args(cli: &Cli) -> Result<Vec<Params>> {
    let mut args = Vec::new();
    if !cli.set.is_empty() {
        args.push(Params::from(parse_pairs(&cli.set)?));
    }
    if !cli.bind.is_empty() {
        args.push(Params::from(parse_pairs(&cli.bind)?));
    } else if !cli.arg.is_empty() {
        args.push(Params::from(
            cli.arg.iter().map(|v| parse_value(v)).collect::<Vec<_>>(),
        ));
    }
    Ok(args)
}

fn parse_pairs(pairs: &[String]) -> Result<Record> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("expected NAME=VALUE, got '{}'", pair))?;
            Ok((name.trim().to_string(), parse_value(value)))
        })
        .collect()
}

/// Numbers, `true`/`false` and `null` are typed; `sql:` marks raw SQL.
fn parse_value(text: &str) -> Value {
    if let Some(raw) = text.strip_prefix("sql:") {
        return Value::raw(raw);
    }
    match text {
        "null" | "NULL" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = text.parse::<i64>() {
                Value::Int(n)
            } else if let Ok(f) = text.parse::<f64>() {
                Value::Float(f)
            } else {
                Value::Text(text.to_string())
            }
        }
    }
}

fn load_engine(cli: &Cli) -> Result<(Engine<MySqlConnector>, bool)> {
    let mut engine = Engine::new(MySqlConnector);
    let configured = match Config::discover(cli.config.as_deref())? {
        Some((path, config)) => {
            if cli.verbose {
                println!("{} {}", "Config:".dimmed(), path.display());
            }
            let ids = config
                .apply(&mut engine)
                .with_context(|| format!("applying {}", path.display()))?;
            !ids.is_empty()
        }
        None => false,
    };
    Ok((engine, configured))
}

async fn execute(command: &str, cli: &Cli) -> Result<()> {
    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), command.yellow());
    }

    let args = build_args(cli)?;
    let (mut engine, configured) = load_engine(cli)?;

    if cli.dry_run || !configured {
        print_sql(&engine, command, &args)?;
        if !configured && !cli.dry_run {
            println!();
            println!(
                "{}",
                "⚠ No connections configured. Use --config or create rapidsql.toml".yellow()
            );
        }
        return Ok(());
    }

    let mut call = Call::new(command);
    for arg in args {
        call = call.arg(arg);
    }
    if let Some(template) = &cli.decorate {
        call = call.decorate(template.replace("\\n", "\n"));
    }

    let output = engine.exec(call).await?;
    print_output(&output, &cli.format);
    Ok(())
}

fn print_sql(engine: &Engine<MySqlConnector>, command: &str, args: &[Params]) -> Result<()> {
    let cmd = engine.tokenize(command)?;
    let options = resolve(&cmd.option_tokens);
    let stmt = cmd.to_sql(&options, args)?;

    println!("{}", "Generated SQL:".green().bold());
    println!("{}", stmt.sql.white());

    if !stmt.params.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        println!("  {}", stmt.params.describe().yellow());
    }
    Ok(())
}

fn print_output(output: &Output, format: &OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(output).unwrap_or_default());
        return;
    }

    match output {
        Output::Rows(rows) => print_table(rows),
        Output::Row(Some(row)) => print_table(std::slice::from_ref(row)),
        Output::Row(None) => println!("{}", "(no record)".dimmed()),
        Output::Paged { pagination, rows } => {
            print_table(rows);
            println!(
                "{} page {} (rpp {}), next {}, prev {}",
                "Pagination:".cyan(),
                pagination.page,
                pagination.rpp,
                pagination.next,
                pagination.prev
            );
        }
        Output::PagedText { rows, .. } | Output::Text(rows) => print!("{}", rows),
        Output::Affected(n) => println!("{} {} rows affected", "✓".green(), n),
        Output::Count(n) => println!("{}", n.to_string().cyan()),
        Output::Bool(b) => println!("{}", if *b { "true".green() } else { "false".red() }),
        Output::Id(id) => println!("{} {}", "Last insert id:".dimmed(), id.to_string().cyan()),
        Output::Sql(sql) => println!("{}", sql.white()),
        Output::Names(names) => {
            for name in names {
                println!("  • {}", name.white());
            }
        }
        Output::Key(key) => println!("{}", key.cyan()),
        Output::LastError(Some(message)) => println!("{}", message.red()),
        Output::LastError(None) => println!("{}", "(no error)".dimmed()),
        Output::Log(lines) => {
            for line in lines {
                println!("{}", line.dimmed());
            }
        }
        Output::Done => println!("{}", "✓ Done".green()),
        other => println!("{}", serde_json::to_string_pretty(other).unwrap_or_default()),
    }
}

fn print_table(rows: &[JsonValue]) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    let columns: Vec<String> = match &rows[0] {
        JsonValue::Object(map) => map.keys().cloned().collect(),
        JsonValue::Array(values) => (0..values.len()).map(|i| i.to_string()).collect(),
        _ => vec!["value".to_string()],
    };
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| match row {
            JsonValue::Object(map) => columns
                .iter()
                .map(|c| map.get(c).map(val_to_string).unwrap_or_default())
                .collect(),
            JsonValue::Array(values) => values.iter().map(val_to_string).collect(),
            other => vec![val_to_string(other)],
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:width$}", c, width = w))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:width$}", cell, width = w))
            .collect();
        println!("{}", line.join(" │ "));
    }

    println!();
    println!("{} row(s) returned", rows.len().to_string().cyan());
}

fn val_to_string(val: &JsonValue) -> String {
    match val {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn explain(command: &str, cli: &Cli) -> Result<()> {
    println!("{}", "Command Explanation".cyan().bold());
    println!();
    println!("{} {}", "Input:".dimmed(), command.yellow());
    println!();

    let (engine, _) = load_engine(cli)?;
    let cmd = engine.tokenize(command)?;
    let options = resolve(&cmd.option_tokens);

    println!("{}", "Parsed Structure:".green().bold());
    println!("  {} {}", "Connection:".dimmed(), cmd.connection_id.to_string().cyan());
    println!("  {} {}", "Table:".dimmed(), cmd.table.white());
    println!("  {} {}", "Columns:".dimmed(), cmd.columns.to_string().white());
    match (&cmd.verb, &cmd.row_id) {
        (Some(verb), _) => println!("  {} {}", "Verb:".dimmed(), verb.to_string().cyan()),
        (None, Some(id)) => println!("  {} {}", "Row:".dimmed(), id.cyan()),
        (None, None) => println!("  {} {}", "Verb:".dimmed(), "select".cyan()),
    }
    if !options.flags.is_empty() {
        let flags: Vec<&str> = options.flags.iter().map(QueryOption::name).collect();
        println!("  {} {}", "Options:".dimmed(), flags.join(", ").cyan());
    }
    if !options.modifiers.is_empty() {
        println!("  {} {}", "Modifiers:".dimmed(), options.modifiers.join(" ").cyan());
    }
    if !cmd.clause.is_empty() {
        println!("  {} {}", "Clause:".dimmed(), cmd.clause.white());
    }

    let args = build_args(cli)?;
    match cmd.to_sql(&options, &args) {
        Ok(stmt) => {
            println!();
            println!("{}", "Generated SQL:".green().bold());
            println!("  {}", stmt.sql.white());
        }
        Err(RapidError::NotSql(_)) => {
            println!();
            println!("{}", "(no SQL: engine command)".dimmed());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn show_verbs() {
    println!("{}", "Verb Reference".cyan().bold());
    println!();

    let verbs = [
        ("add, insert", "Insert a record", "INSERT INTO t(...) VALUES(...)"),
        ("replace", "Replace a record", "REPLACE INTO t(...) VALUES(...)"),
        ("mod, update", "Update records", "UPDATE t SET ..."),
        ("del, delete", "Delete records", "DELETE FROM t"),
        ("call*", "Call a stored procedure", "CALL sp(?, ?)"),
        ("count", "Count records", "SELECT COUNT(1) AS count"),
        ("exists", "Check for records", "SELECT EXISTS(...)"),
        ("columns", "List table columns", "SHOW COLUMNS FROM t"),
        ("tables", "List tables", "SHOW TABLES"),
        ("truncate", "Empty a table", "TRUNCATE t"),
        ("query", "Run SQL verbatim", "<clause>"),
        ("key", "Get or set a primary key column", "-"),
        ("cache", "Set the next cache expiry", "-"),
        ("pagination", "Get or set pagination", "-"),
        ("id", "Last insert id", "-"),
        ("error, error_last", "Error state", "-"),
        ("log, debug", "Debug log and connection info", "-"),
        ("transaction", "Begin a transaction", "START TRANSACTION"),
        ("commit, rollback", "End a transaction", "COMMIT / ROLLBACK"),
    ];

    println!(
        "{:20} {:34} {}",
        "Verb".white().bold(),
        "Function".white().bold(),
        "SQL Equivalent".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());

    for (verb, function, sql) in verbs {
        println!("{:20} {:34} {}", verb.cyan().bold(), function.white(), sql.dimmed());
    }

    println!();
    println!("{}", "Options".cyan().bold());
    for opt in QueryOption::ALL {
        println!("  /{}", opt.name().to_lowercase().yellow());
    }
    println!("  {}", "any other /token is passed through as a SQL keyword".dimmed());
}
