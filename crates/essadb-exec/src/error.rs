//! `SQLError`: the one error type that crosses the statement boundary
//! (spec §6/§7). Every lex/parse/name-resolution/type/integrity/storage
//! error gets wrapped here with the source offset of the token or
//! expression that caused it, where one is known.

use essadb_core::DbError;
use essadb_parser::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SQLError {
    pub message: String,
    pub token_offset: Option<usize>,
}

impl SQLError {
    pub fn new(message: impl Into<String>, token_offset: Option<usize>) -> Self {
        Self {
            message: message.into(),
            token_offset,
        }
    }
}

impl From<ParseError> for SQLError {
    fn from(e: ParseError) -> Self {
        SQLError::new(e.message(), Some(e.token_offset()))
    }
}

/// `DbError`s arise deep inside evaluation/storage with no token tracked at
/// that layer; the statement boundary is the only place that still knows
/// the offset, so callers that have one attach it via `at_offset`.
impl From<DbError> for SQLError {
    fn from(e: DbError) -> Self {
        SQLError::new(e.to_string(), None)
    }
}

pub trait AtOffset<T> {
    /// Attaches `offset` to an error that doesn't already carry one.
    fn at_offset(self, offset: usize) -> Result<T, SQLError>;
}

impl<T, E: Into<SQLError>> AtOffset<T> for Result<T, E> {
    fn at_offset(self, offset: usize) -> Result<T, SQLError> {
        self.map_err(|e| {
            let mut err: SQLError = e.into();
            if err.token_offset.is_none() {
                err.token_offset = Some(offset);
            }
            err
        })
    }
}
