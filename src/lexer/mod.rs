//! Lexer for query text.
//!
//! Turns a UTF-8 query string into a flat token sequence. Identifiers are
//! resolved against the function registry, operator symbols against the
//! binop registry, and the backtick literal forms (`` `...` ``, ``g`...` ``,
//! ``j`...` ``) produce JSON values directly.

mod stream;
mod token;

pub use stream::*;
pub use token::*;

use crate::binop::BINOPS;
use crate::error::RemesPathError;
use crate::functions::FUNCTIONS;
use crate::json::{CurJson, Json, JsonRegex};

use regex::Regex;

/// Two-character operator symbols, tried before the single-character ones so
/// that the longest match wins.
const TWO_CHAR_BINOPS: [&str; 7] = ["**", "//", "=~", "==", "!=", "<=", ">="];

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            tokens: vec![],
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.position..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn eat_whitespace(&mut self) {
        while self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.bump();
        }
    }

    pub fn lex(mut self) -> Result<Vec<Token>, RemesPathError> {
        loop {
            self.eat_whitespace();
            let Some(next) = self.peek() else {
                return Ok(self.tokens);
            };
            let offset = self.position;

            match next {
                '0'..='9' => self.lex_number(offset)?,
                '`' => {
                    let raw = self.read_enclosed("string literal", offset)?;
                    let value = unescape::unescape(&raw).ok_or_else(|| {
                        RemesPathError::lex("invalid escape sequence in string literal", offset)
                    })?;
                    self.push_value(Json::Str(value), offset);
                }
                'g' if self.peek_at(1) == Some('`') => {
                    self.bump();
                    let raw = self.read_enclosed("regex literal", offset)?;
                    let regex = Regex::new(&raw).map_err(|e| {
                        RemesPathError::lex(format!("invalid regex literal: {e}"), offset)
                    })?;
                    self.push_value(Json::Regex(JsonRegex::new(regex)), offset);
                }
                'j' if self.peek_at(1) == Some('`') => {
                    self.bump();
                    let raw = self.read_enclosed("JSON literal", offset)?;
                    let value = Json::parse(&raw).map_err(|e| {
                        RemesPathError::lex(format!("invalid JSON literal: {e}"), offset)
                    })?;
                    self.push_value(value, offset);
                }
                'a'..='z' | 'A'..='Z' | '_' => self.lex_word(offset),
                '@' => {
                    self.bump();
                    self.push_value(Json::CurJson(CurJson::identity()), offset);
                }
                '.' => {
                    self.bump();
                    if self.peek() == Some('.') {
                        self.bump();
                        self.tokens.push(Token::DotDot { offset });
                    } else {
                        self.tokens.push(Token::Dot { offset });
                    }
                }
                '[' => self.push_delim(Token::LBracket { offset }),
                ']' => self.push_delim(Token::RBracket { offset }),
                '{' => self.push_delim(Token::LBrace { offset }),
                '}' => self.push_delim(Token::RBrace { offset }),
                '(' => self.push_delim(Token::LParen { offset }),
                ')' => self.push_delim(Token::RParen { offset }),
                ',' => self.push_delim(Token::Comma { offset }),
                ':' => self.push_delim(Token::Colon { offset }),
                _ => self.lex_binop(offset)?,
            }
        }
    }

    fn push_value(&mut self, value: Json, offset: usize) {
        self.tokens.push(Token::Value { value, offset });
    }

    fn push_delim(&mut self, token: Token) {
        self.bump();
        self.tokens.push(token);
    }

    fn lex_number(&mut self, offset: usize) -> Result<(), RemesPathError> {
        let mut is_float = false;

        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            self.bump();
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.bump();
            }
            is_float = true;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_len = match self.peek_at(1) {
                Some(c) if c.is_ascii_digit() => Some(1),
                Some('+' | '-') => match self.peek_at(2) {
                    Some(c) if c.is_ascii_digit() => Some(2),
                    _ => None,
                },
                _ => None,
            };
            if let Some(len) = exponent_len {
                for _ in 0..len {
                    self.bump();
                }
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.bump();
                }
                is_float = true;
            }
        }

        let text = &self.input[offset..self.position];
        let value = if is_float {
            let num = text
                .parse::<f64>()
                .map_err(|_| RemesPathError::lex(format!("invalid number '{text}'"), offset))?;
            Json::Float(num)
        } else {
            match text.parse::<i64>() {
                Ok(num) => Json::Int(num),
                // too big for i64, fall back to float
                Err(_) => Json::Float(text.parse::<f64>().map_err(|_| {
                    RemesPathError::lex(format!("invalid number '{text}'"), offset)
                })?),
            }
        };
        self.push_value(value, offset);
        Ok(())
    }

    /// Read a backtick-enclosed literal body. Only the `` \` `` escape is
    /// resolved here; other escape pairs pass through untouched so that
    /// regex and JSON literal bodies keep their own escape languages.
    fn read_enclosed(&mut self, what: &str, offset: usize) -> Result<String, RemesPathError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(RemesPathError::lex(format!("unterminated {what}"), offset)),
                Some('`') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => {
                        return Err(RemesPathError::lex(format!("unterminated {what}"), offset))
                    }
                    Some('`') => out.push('`'),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_word(&mut self, offset: usize) {
        while self
            .peek()
            .map(|c| c.is_alphanumeric() || c == '_')
            .unwrap_or(false)
        {
            self.bump();
        }
        let word = &self.input[offset..self.position];

        match word {
            "true" => self.push_value(Json::Bool(true), offset),
            "false" => self.push_value(Json::Bool(false), offset),
            "null" => self.push_value(Json::Null, offset),
            _ => {
                if let Some(func) = FUNCTIONS.get(word) {
                    self.tokens.push(Token::Function { func, offset });
                } else {
                    self.tokens.push(Token::Word {
                        value: word.to_owned(),
                        offset,
                    });
                }
            }
        }
    }

    fn lex_binop(&mut self, offset: usize) -> Result<(), RemesPathError> {
        let rest = &self.input[self.position..];
        for sym in TWO_CHAR_BINOPS {
            if rest.starts_with(sym) {
                let op = BINOPS
                    .get(sym)
                    .ok_or_else(|| RemesPathError::lex(format!("unknown operator '{sym}'"), offset))?;
                self.position += sym.len();
                self.tokens.push(Token::Binop { op, offset });
                return Ok(());
            }
        }

        let Some(c) = self.peek() else {
            return Err(RemesPathError::lex("unexpected end of query", offset));
        };
        let mut buf = [0u8; 4];
        let symbol: &str = c.encode_utf8(&mut buf);
        if let Some(op) = BINOPS.get(symbol) {
            self.bump();
            self.tokens.push(Token::Binop { op, offset });
            return Ok(());
        }

        Err(RemesPathError::lex(
            format!("unexpected character '{c}'"),
            offset,
        ))
    }
}
