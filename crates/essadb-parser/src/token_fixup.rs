//! The lexer greedily folds a leading `-` into any numeric literal that
//! follows it (see `essadb_lexer::lexer::prefix_minus_allowed`). Before
//! parsing we walk the token stream once and split back apart every fold
//! that turns out to have landed in a binary-operator position, so the rest
//! of the parser never has to think about it.

use essadb_lexer::{prefix_minus_allowed, Punct, Token, TokenKind};

pub fn normalize(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let folded = matches!(token.kind, TokenKind::Int | TokenKind::Float) && token.text.starts_with('-');
        if folded {
            let rest = &token.text[1..];
            if rest.is_empty() {
                out.push(Token::new(TokenKind::Punct(Punct::Minus), "-", token.start_offset));
                continue;
            }
            if !prefix_minus_allowed(out.last()) {
                out.push(Token::new(TokenKind::Punct(Punct::Minus), "-", token.start_offset));
                out.push(Token::new(token.kind, rest, token.start_offset + 1));
                continue;
            }
        }
        out.push(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use essadb_lexer::Lexer;

    #[test]
    fn splits_binary_minus_from_folded_literal() {
        let tokens = normalize(Lexer::tokenize("5 - 3").unwrap());
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[1].kind, TokenKind::Punct(Punct::Minus));
        assert_eq!(tokens[2].kind, TokenKind::Int);
        assert_eq!(tokens[2].text.as_str(), "3");
    }

    #[test]
    fn keeps_prefix_minus_as_one_literal() {
        let tokens = normalize(Lexer::tokenize("a = -3").unwrap());
        assert_eq!(tokens[2].kind, TokenKind::Int);
        assert_eq!(tokens[2].text.as_str(), "-3");
    }

    #[test]
    fn bare_minus_before_identifier_becomes_punct() {
        let tokens = normalize(Lexer::tokenize("a-b").unwrap());
        assert_eq!(tokens[1].kind, TokenKind::Punct(Punct::Minus));
    }
}
