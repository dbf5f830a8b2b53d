use super::Token;

/// Cursor over the lexed token sequence.
///
/// All reads go through one indexed primitive: [`TokenStream::lookahead`]
/// clones the token `ahead` places past the cursor without consuming
/// anything, and [`TokenStream::advance`] consumes the next token. The
/// cursor position is the token index reported in parse errors.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream { tokens, cursor: 0 }
    }

    /// The token `ahead` places past the cursor, if any.
    pub fn lookahead(&self, ahead: usize) -> Option<Token> {
        self.tokens.get(self.cursor + ahead).cloned()
    }

    /// Consume and return the next token.
    pub fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        self.cursor += token.is_some() as usize;
        token
    }

    /// The index of the next unconsumed token.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    #[test]
    fn test_lookahead_does_not_consume() {
        let mut stream = TokenStream::new(Lexer::new("1, 2").lex().unwrap());

        assert!(matches!(stream.lookahead(1), Some(Token::Comma { .. })));
        assert_eq!(stream.cursor(), 0);

        assert!(matches!(stream.advance(), Some(Token::Value { .. })));
        assert!(matches!(stream.advance(), Some(Token::Comma { .. })));
        assert!(matches!(stream.advance(), Some(Token::Value { .. })));
        assert!(stream.advance().is_none());
        assert!(stream.lookahead(0).is_none());
        // a drained stream stays at the end
        assert_eq!(stream.cursor(), 3);
    }
}
