use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "essadb")]
#[command(about = "EssaDB: a small relational database engine with a SQL frontend.", long_about = None, version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a single SQL statement against a database directory.
    #[command(name = "exec")]
    Exec(ExecArgs),
    /// Run every statement in a `.sql` script, in order, against a
    /// database directory.
    #[command(name = "script")]
    Script(ScriptArgs),
}

#[derive(Debug, Parser)]
pub struct ExecArgs {
    /// Directory EDB-backed tables are created/opened relative to.
    #[arg(long = "db", default_value = ".")]
    pub db_dir: PathBuf,

    /// The SQL statement to run.
    pub sql: String,

    /// Use the Unicode "fancy" result-set dump instead of the plain one.
    #[arg(long)]
    pub fancy: bool,
}

#[derive(Debug, Parser)]
pub struct ScriptArgs {
    #[arg(long = "db", default_value = ".")]
    pub db_dir: PathBuf,

    /// Path to a file holding `;`-separated SQL statements.
    pub file: PathBuf,

    #[arg(long)]
    pub fancy: bool,
}
