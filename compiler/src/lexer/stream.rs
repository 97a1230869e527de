//! Lookahead wrapper over the lazy lexer.

use crate::lexer::{LexError, Lexer, Span, Token, TokenKind, TokenValue};
use crate::utils::LookAhead;

/// One-token-lookahead stream consumed by the parser.
///
/// End of input is a real token: once the lexer is exhausted the stream
/// keeps answering with `EndOfFile`, so callers never see an absent
/// current token.
pub struct TokenStream<'a> {
    tokens: LookAhead<Lexer<'a>>,
    eof: Token,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        let end = Span {
            start: source.len(),
            end: source.len(),
        };
        Self {
            tokens: LookAhead::new(Lexer::new(source)),
            eof: Token {
                kind: TokenKind::EndOfFile,
                value: TokenValue::None,
                span: end,
            },
        }
    }

    fn peek(&mut self, offset: usize) -> Result<Token, LexError> {
        match self.tokens.peek(offset) {
            None => Ok(self.eof.clone()),
            Some(Ok(token)) => Ok(token.clone()),
            Some(Err(e)) => Err(e.clone()),
        }
    }

    /// The token under the cursor.
    pub fn current(&mut self) -> Result<Token, LexError> {
        self.peek(0)
    }

    /// The token after the cursor.
    pub fn next(&mut self) -> Result<Token, LexError> {
        self.peek(1)
    }

    /// Advance unconditionally, returning the token that was current.
    pub fn move_next(&mut self) -> Result<Token, LexError> {
        let current = self.peek(0)?;
        if current.kind != TokenKind::EndOfFile {
            let _ = self.tokens.next();
        }
        Ok(current)
    }

    /// Advance past a token of the expected kind, or fail.
    pub fn consume(&mut self, expected: TokenKind) -> Result<Token, LexError> {
        let current = self.current()?;
        if current.kind == expected {
            self.move_next()
        } else {
            Err(LexError::UnexpectedToken {
                expected,
                found: current.kind,
                offset: current.span.start,
            })
        }
    }

    /// Advance past a token of the expected kind if present.
    pub fn consume_if_matches(&mut self, expected: TokenKind) -> Result<Option<Token>, LexError> {
        if self.check_current(expected)? {
            Ok(Some(self.move_next()?))
        } else {
            Ok(None)
        }
    }

    pub fn check_current(&mut self, kind: TokenKind) -> Result<bool, LexError> {
        Ok(self.current()?.kind == kind)
    }

    pub fn check_next(&mut self, kind: TokenKind) -> Result<bool, LexError> {
        Ok(self.next()?.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_and_next_lookahead() {
        let mut stream = TokenStream::new("a b");
        assert_eq!(stream.current().unwrap().text(), "a");
        assert_eq!(stream.next().unwrap().text(), "b");
        // Looking ahead does not consume.
        assert_eq!(stream.current().unwrap().text(), "a");
    }

    #[test]
    fn test_end_of_file_is_a_real_token() {
        let mut stream = TokenStream::new("a");
        assert_eq!(stream.next().unwrap().kind, TokenKind::EndOfFile);
        stream.move_next().unwrap();
        assert_eq!(stream.current().unwrap().kind, TokenKind::EndOfFile);
        // Advancing at the end stays at the end.
        stream.move_next().unwrap();
        assert_eq!(stream.current().unwrap().kind, TokenKind::EndOfFile);
    }

    #[test]
    fn test_consume_validates_kind() {
        let mut stream = TokenStream::new("( )");
        stream.consume(TokenKind::LParen).unwrap();
        match stream.consume(TokenKind::Semicolon) {
            Err(LexError::UnexpectedToken {
                expected: TokenKind::Semicolon,
                found: TokenKind::RParen,
                ..
            }) => {}
            other => panic!("expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_consume_if_matches_returns_none_on_mismatch() {
        let mut stream = TokenStream::new("x");
        assert!(stream.consume_if_matches(TokenKind::Const).unwrap().is_none());
        assert!(stream.consume_if_matches(TokenKind::Identifier).unwrap().is_some());
    }

    #[test]
    fn test_check_helpers() {
        let mut stream = TokenStream::new("if (");
        assert!(stream.check_current(TokenKind::If).unwrap());
        assert!(stream.check_next(TokenKind::LParen).unwrap());
        assert!(!stream.check_current(TokenKind::Else).unwrap());
    }

    #[test]
    fn test_lex_error_surfaces_through_stream() {
        let mut stream = TokenStream::new("@");
        assert!(stream.current().is_err());
    }
}
