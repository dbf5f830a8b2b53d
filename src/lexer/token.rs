use crate::binop::Binop;
use crate::functions::ArgFunction;
use crate::json::Json;

/// A single token of a query. Every token carries the character offset of
/// its first character in the query text.
#[derive(Debug, Clone)]
pub enum Token {
    /// A JSON literal (number, string, bool, null, `g` regex literal,
    /// `j` JSON literal) or the current-input reference `@`.
    Value { value: Json, offset: usize },
    /// An unquoted identifier that names neither a literal keyword nor a
    /// registered function.
    Word { value: String, offset: usize },
    /// A reference into the binop registry.
    Binop { op: &'static Binop, offset: usize },
    /// A reference into the function registry.
    Function {
        func: &'static ArgFunction,
        offset: usize,
    },
    Dot { offset: usize },
    DotDot { offset: usize },
    LBracket { offset: usize },
    RBracket { offset: usize },
    LBrace { offset: usize },
    RBrace { offset: usize },
    LParen { offset: usize },
    RParen { offset: usize },
    Comma { offset: usize },
    Colon { offset: usize },
}

impl Token {
    pub fn offset(&self) -> usize {
        match self {
            Token::Value { offset, .. }
            | Token::Word { offset, .. }
            | Token::Binop { offset, .. }
            | Token::Function { offset, .. }
            | Token::Dot { offset }
            | Token::DotDot { offset }
            | Token::LBracket { offset }
            | Token::RBracket { offset }
            | Token::LBrace { offset }
            | Token::RBrace { offset }
            | Token::LParen { offset }
            | Token::RParen { offset }
            | Token::Comma { offset }
            | Token::Colon { offset } => *offset,
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Value { value, .. } => format!("{} literal", value.type_name()),
            Token::Word { value, .. } => format!("identifier '{value}'"),
            Token::Binop { op, .. } => format!("binary operator '{}'", op.name),
            Token::Function { func, .. } => format!("function '{}'", func.name),
            Token::Dot { .. } => "'.'".to_owned(),
            Token::DotDot { .. } => "'..'".to_owned(),
            Token::LBracket { .. } => "'['".to_owned(),
            Token::RBracket { .. } => "']'".to_owned(),
            Token::LBrace { .. } => "'{'".to_owned(),
            Token::RBrace { .. } => "'}'".to_owned(),
            Token::LParen { .. } => "'('".to_owned(),
            Token::RParen { .. } => "')'".to_owned(),
            Token::Comma { .. } => "','".to_owned(),
            Token::Colon { .. } => "':'".to_owned(),
        }
    }
}
