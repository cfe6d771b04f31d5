use thiserror::Error;

/// Raised while parsing (grammar violations, unexpected tokens) -- carries
/// the offending token's source offset the way `SQLLexError` carries one
/// for lexical errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SQLParseError {
    pub message: String,
    pub token_offset: usize,
}

impl SQLParseError {
    pub fn new(message: impl Into<String>, token_offset: usize) -> Self {
        Self {
            message: message.into(),
            token_offset,
        }
    }
}
