use essadb_ast::SQLParseError;
use essadb_lexer::SQLLexError;
use thiserror::Error;

/// Either stage of turning SQL text into a `Statement` can fail; both carry
/// a source offset (spec §4.3/§4.4/§7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] SQLLexError),
    #[error(transparent)]
    Parse(#[from] SQLParseError),
}

impl ParseError {
    pub fn token_offset(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.start_offset,
            ParseError::Parse(e) => e.token_offset,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ParseError::Lex(e) => e.message.clone(),
            ParseError::Parse(e) => e.message.clone(),
        }
    }
}
