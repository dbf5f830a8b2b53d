use std::{error::Error, fmt::Display};

/// Errors raised by the query engine. Every failure of a `compile`, `search`
/// or `apply` call is one of these kinds; none of them are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemesPathError {
    /// A malformed token, reported with the character offset in the query.
    Lex { message: String, offset: usize },
    /// An unexpected token, unterminated construct, mixed-kind bracket list,
    /// bad arity or argument type, reported with the index of the offending
    /// token.
    Parse { message: String, token_index: usize },
    /// A shape mismatch between two iterables in a binop, or a bad mask in a
    /// boolean index.
    VectorizedArithmetic { message: String },
    /// A value (often a late-bound one) resolved to a type its consumer
    /// cannot accept.
    Type { message: String },
    /// A construct the engine deliberately does not support, such as
    /// recursive search for array indices or slices.
    NotImplemented { message: String },
}

impl RemesPathError {
    pub fn lex(message: impl Into<String>, offset: usize) -> Self {
        RemesPathError::Lex {
            message: message.into(),
            offset,
        }
    }

    pub fn parse(message: impl Into<String>, token_index: usize) -> Self {
        RemesPathError::Parse {
            message: message.into(),
            token_index,
        }
    }

    /// Parse error for a production that ran out of tokens.
    pub fn eof(parsing: &str, token_index: usize) -> Self {
        RemesPathError::Parse {
            message: format!("hit end of query while parsing {parsing}"),
            token_index,
        }
    }
}

impl Display for RemesPathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemesPathError::Lex { message, offset } => {
                write!(f, "lex error at offset {offset}: {message}")
            }
            RemesPathError::Parse {
                message,
                token_index,
            } => write!(f, "parse error at token {token_index}: {message}"),
            RemesPathError::VectorizedArithmetic { message } => {
                write!(f, "vectorized arithmetic error: {message}")
            }
            RemesPathError::Type { message } => write!(f, "type error: {message}"),
            RemesPathError::NotImplemented { message } => {
                write!(f, "not implemented: {message}")
            }
        }
    }
}

impl Error for RemesPathError {}
