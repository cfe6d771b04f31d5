use thiserror::Error;

/// The lexer itself never fails: unrecognized bytes become `Garbage`
/// tokens. `SQLLexError` is raised by callers (string/bracket/date literals
/// that run off the end of input) -- mirrors the teacher's
/// `parser-core/src/errors.rs::SQLLexError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SQLLexError {
    pub message: String,
    pub start_offset: usize,
}

impl SQLLexError {
    pub fn new(message: impl Into<String>, start_offset: usize) -> Self {
        Self {
            message: message.into(),
            start_offset,
        }
    }
}
