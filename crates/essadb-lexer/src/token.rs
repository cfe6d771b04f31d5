//! `Token`: `{ type, value, start_offset }` (spec §4.3).

use smol_str::SmolStr;

use crate::keyword::Keyword;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Star,
    Comma,
    LParen,
    RParen,
    Semicolon,
    Bang,
    Dot,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
    Plus,
    Minus,
    Slash,
}

impl Punct {
    pub fn as_str(self) -> &'static str {
        match self {
            Punct::Star => "*",
            Punct::Comma => ",",
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::Semicolon => ";",
            Punct::Bang => "!",
            Punct::Dot => ".",
            Punct::Eq => "=",
            Punct::Lt => "<",
            Punct::Gt => ">",
            Punct::Le => "<=",
            Punct::Ge => ">=",
            Punct::Ne => "!=",
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Slash => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    Int,
    Float,
    String,
    Date,
    Punct(Punct),
    Eof,
    Garbage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Verbatim source text for identifiers/literals (no escape processing,
    /// bracket/quote delimiters already stripped); the keyword spelling for
    /// keywords, the one/two-char spelling for punctuation.
    pub text: SmolStr,
    pub start_offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<SmolStr>, start_offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start_offset,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.kind, TokenKind::Keyword(k) if k == keyword)
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }
}
