//! The integrity/type/name-resolution error taxonomy from spec §7.
//!
//! These are the error kinds owned by the data model and storage layers;
//! `essadb-ast`/`essadb-parser` define their own `SQLParseError`/
//! `SQLLexError`, and `essadb-exec` wraps all of them into one `SQLError`
//! carrying a source offset at the statement boundary.

use thiserror::Error;

use crate::value::ColumnType;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("No matching operator '{op}' for '{ty}' type")]
    NoMatchingOperator { op: String, ty: String },

    #[error("'{0}' is not a valid int")]
    InvalidInt(String),

    #[error("'{0}' is not a valid float")]
    InvalidFloat(String),

    #[error("Invalid identifier")]
    InvalidIdentifier,

    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnDoesNotExist { column: String, table: String },

    #[error("Nonexistent table '{0}'")]
    NonexistentTable(String),

    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Value can't be null")]
    ValueCantBeNull,

    #[error("Not valid UNIQUE value")]
    NotValidUniqueValue,

    #[error("Primary key may not be null")]
    PrimaryKeyMayNotBeNull,

    #[error("Primary key must be unique")]
    PrimaryKeyMustBeUnique,

    #[error("Foreign key '{column}' requires matching value in '{table}'")]
    ForeignKeyViolation { column: String, table: String },

    #[error("Values doesn't match {0} check rule")]
    CheckViolation(String),

    #[error("Column '{0}' must be either aggregate or occur in GROUP BY clause")]
    NotAggregateOrGroupBy(String),

    #[error("Select expression must return a single row with a single value")]
    ScalarSelectCardinality,

    #[error("You need a table to do SELECT *")]
    StarWithoutTable,

    #[error("Queries with different column count/set")]
    UnionColumnMismatch,

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the EDB storage engine (spec §4.7/§7). Every I/O or
/// structural failure is typed; `essadb-exec` wraps these into a `SQLError`
/// tagged with the statement's source offset at the statement boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("OsError: {function}: {errno}")]
    Os { function: &'static str, errno: i32 },

    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Block size/layout mismatch")]
    BlockLayoutMismatch,

    #[error("allocation of {requested} bytes exceeds the block size ({block_size} bytes); big blocks are not implemented")]
    AllocationTooLarge { requested: u64, block_size: u32 },

    #[error("heap exhausted: no free chunk large enough for {0} bytes")]
    HeapExhausted(u64),
}

impl DbError {
    pub fn no_matching_operator(op: &str, ty: ColumnType) -> Self {
        DbError::NoMatchingOperator {
            op: op.to_string(),
            ty: ty.to_string(),
        }
    }
}
