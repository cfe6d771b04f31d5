//! Non-interactive command dispatch for the `essadb` binary: parse SQL,
//! execute it against a database directory, and print the resulting
//! `ResultSet` or a formatted error. REPL-style interactive editing is out
//! of scope (spec §1); this is the ambient scriptable entry point a
//! frontend needs regardless.

pub mod commands;
mod logger;

use std::path::Path;

use clap::Parser as _;
use essadb_core::Database;
use essadb_exec::{EngineConfig, SQLError};

use crate::commands::{Cli, Commands, ExecArgs, ScriptArgs};

pub fn run_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let _ = logger::init();
    let cli = Cli::parse_from(args);

    let result = match cli.command {
        Commands::Exec(args) => run_exec(args),
        Commands::Script(args) => run_script(args),
    };

    match result {
        Ok(()) => 0,
        Err(message) => {
            eprintln!("{message}");
            1
        }
    }
}

fn run_exec(args: ExecArgs) -> Result<(), String> {
    let config = EngineConfig {
        data_dir: args.db_dir.clone(),
        ..EngineConfig::default()
    };
    let mut db = essadb_exec::open_database(&config).map_err(|e| e.to_string())?;
    run_statement(&mut db, &config, &args.sql, args.fancy)
}

fn run_script(args: ScriptArgs) -> Result<(), String> {
    let config = EngineConfig {
        data_dir: args.db_dir.clone(),
        ..EngineConfig::default()
    };
    let mut db = essadb_exec::open_database(&config).map_err(|e| e.to_string())?;
    let text = std::fs::read_to_string(&args.file).map_err(|e| format!("failed to read '{}': {e}", args.file.display()))?;
    for statement in split_statements(&text) {
        run_statement(&mut db, &config, statement, args.fancy)?;
    }
    Ok(())
}

/// Splits a script on top-level `;` the way the parser itself would accept
/// one statement at a time -- a bare textual split is sufficient because
/// string/identifier literals in this dialect never contain an unescaped
/// `;` (spec §4.3 lexer rules have no escape processing, but `;` is not a
/// legal body character inside `'...'`, `[...]` or `#...#`).
fn split_statements(text: &str) -> impl Iterator<Item = &str> {
    text.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn run_statement(db: &mut Database, config: &EngineConfig, sql: &str, fancy: bool) -> Result<(), String> {
    log::debug!("executing statement: {sql}");
    let stmt = essadb_parser::parse(sql).map_err(|e| format_error(sql, &SQLError::from(e)))?;
    let outcome = essadb_exec::execute_statement(db, &stmt, config).map_err(|e| format_error(sql, &SQLError::from(e)))?;
    match outcome {
        essadb_ast::ValueOrResultSet::ResultSet(rs) if !rs.column_names.is_empty() => {
            print!("{}", if fancy { rs.dump_fancy() } else { rs.dump_plain() });
        }
        essadb_ast::ValueOrResultSet::ResultSet(_) => {}
        essadb_ast::ValueOrResultSet::Value(v) => println!("{v}"),
    }
    Ok(())
}

/// Renders a `SQLError` with a `^` caret under the token/expression that
/// caused it, using the offset every error in the taxonomy carries
/// (spec §4.3/§7).
fn format_error(sql: &str, err: &SQLError) -> String {
    match err.token_offset {
        Some(offset) if offset <= sql.len() => {
            let caret_line = " ".repeat(char_column(sql, offset)) + "^";
            format!("{sql}\n{caret_line}\nerror: {}", err.message)
        }
        _ => format!("error: {}", err.message),
    }
}

fn char_column(sql: &str, byte_offset: usize) -> usize {
    sql.get(..byte_offset).map(|s| s.chars().count()).unwrap_or(0)
}

/// Relative path of the `.edb` file a table named `name` would live at
/// under `dir`, for callers that want to check existence before opening.
pub fn edb_path(dir: &Path, name: &str) -> std::path::PathBuf {
    dir.join(format!("{name}.edb"))
}
