//! Parser/compiler for queries.
//!
//! A single top-down recursive-descent parser with an embedded
//! precedence-climbing loop for binary operators. Parsing produces a
//! compiled query: a constant value when the query is input-independent,
//! otherwise a late-bound function of the input. Constant subtrees fold at
//! compile time, so a fully constant query compiles to its result.

use crate::binop::{Binop, NEG_POW};
use crate::error::RemesPathError;
use crate::eval::{resolve_binop, resolve_function_call};
use crate::functions::{ArgFunction, FUNCTIONS, VARIADIC};
use crate::indexer::{apply_indexers, Indexer, IndexerKind, Projection};
use crate::json::{CurJson, Dtype, Json, JsonSlice};
use crate::lexer::{Lexer, Token, TokenStream};

/// Compile a query into a constant value or a late-bound function of the
/// input.
pub fn compile_query(query: &str) -> Result<Json, RemesPathError> {
    let tokens = Lexer::new(query).lex()?;
    let mut tokens = TokenStream::new(tokens);
    let compiled = parse_expr_or_scalar_func(&mut tokens)?;
    if let Some(token) = tokens.lookahead(0) {
        return Err(RemesPathError::parse(
            format!("unexpected {} after the end of the query", token.describe()),
            tokens.cursor(),
        ));
    }
    Ok(compiled)
}

/// A binop tree under construction: a root plus a spine of incomplete right
/// children ending at the rightmost leaf.
struct BinopWithArgs {
    op: &'static Binop,
    token_index: usize,
    left: Operand,
    right: Operand,
}

enum Operand {
    Empty,
    Value(Json),
    Node(Box<BinopWithArgs>),
}

impl BinopWithArgs {
    fn new(op: &'static Binop, token_index: usize, left: Json) -> Box<Self> {
        Box::new(BinopWithArgs {
            op,
            token_index,
            left: Operand::Value(left),
            right: Operand::Empty,
        })
    }

    /// Attach the pending operand at the rightmost incomplete position.
    fn complete(&mut self, value: Json) {
        match &mut self.right {
            Operand::Node(child) => child.complete(value),
            _ => self.right = Operand::Value(value),
        }
    }

    /// Insert a new binop into the right spine: it becomes the parent of
    /// the deepest subtree whose root precedence is at least the new
    /// operator's effective precedence. Equal precedence resolves leftward,
    /// so the epsilon nudge on `**` yields right-association.
    fn insert(
        self: Box<Self>,
        op: &'static Binop,
        token_index: usize,
        precedence: f64,
    ) -> Box<Self> {
        if precedence <= self.op.precedence {
            return Box::new(BinopWithArgs {
                op,
                token_index,
                left: Operand::Node(self),
                right: Operand::Empty,
            });
        }
        let mut node = self;
        node.right = match std::mem::replace(&mut node.right, Operand::Empty) {
            Operand::Node(child) => Operand::Node(child.insert(op, token_index, precedence)),
            Operand::Value(value) => Operand::Node(BinopWithArgs::new(op, token_index, value)),
            Operand::Empty => Operand::Node(Box::new(BinopWithArgs {
                op,
                token_index,
                left: Operand::Empty,
                right: Operand::Empty,
            })),
        };
        node
    }

    /// Bottom-up resolution of the tree, taking late binding into account.
    fn resolve(self) -> Result<Json, RemesPathError> {
        let BinopWithArgs {
            op,
            token_index,
            left,
            right,
        } = self;
        let left = resolve_operand(left, token_index)?;
        let right = resolve_operand(right, token_index)?;
        let out_type = op
            .out_type(left.dtype(), right.dtype())
            .map_err(|message| RemesPathError::parse(message, token_index))?;
        resolve_binop(op, left, right, out_type)
    }
}

fn resolve_operand(operand: Operand, token_index: usize) -> Result<Json, RemesPathError> {
    match operand {
        Operand::Value(value) => Ok(value),
        Operand::Node(node) => node.resolve(),
        Operand::Empty => Err(RemesPathError::parse(
            "binary operator is missing an operand",
            token_index,
        )),
    }
}

/// Reads left-hand expressions and binop tokens alternately, maintaining
/// the tree under construction, then folds it bottom-up at the first
/// non-binop token.
///
/// Unary minus toggles a pending flag; when the operand that follows is the
/// base of a `**`, the minus folds into the synthetic negate-power binop
/// instead of applying immediately, preserving `unary - > **` binding.
pub(crate) fn parse_expr_or_scalar_func(
    tokens: &mut TokenStream,
) -> Result<Json, RemesPathError> {
    let mut uminus = false;
    let mut root: Option<Box<BinopWithArgs>> = None;
    let mut pending: Option<Json> = None;

    loop {
        match tokens.lookahead(0) {
            Some(Token::Binop { op, .. }) if pending.is_none() => {
                // operand position: only unary minus is admissible here
                if op.name != "-" {
                    return Err(RemesPathError::parse(
                        format!("expected an expression, got binary operator '{}'", op.name),
                        tokens.cursor(),
                    ));
                }
                tokens.advance();
                uminus = !uminus;
            }
            Some(Token::Binop { mut op, .. }) => {
                let token_index = tokens.cursor();
                tokens.advance();
                if op.name == "**" && uminus {
                    op = &NEG_POW;
                    uminus = false;
                }
                let precedence = if op.is_right_associative {
                    // the epsilon nudge against equal-precedence `**`
                    op.precedence + 0.1
                } else {
                    op.precedence
                };
                let Some(operand) = pending.take() else {
                    return Err(RemesPathError::parse(
                        format!("binary operator '{}' is missing a left operand", op.name),
                        token_index,
                    ));
                };
                root = Some(match root.take() {
                    None => BinopWithArgs::new(op, token_index, operand),
                    Some(mut node) => {
                        node.complete(operand);
                        node.insert(op, token_index, precedence)
                    }
                });
            }
            Some(_) if pending.is_none() => {
                let mut operand = parse_expr_or_scalar(tokens)?;
                if uminus {
                    let next_is_pow =
                        matches!(tokens.lookahead(0), Some(Token::Binop { op, .. }) if op.name == "**");
                    if !next_is_pow {
                        operand = negate(operand)?;
                        uminus = false;
                    }
                }
                pending = Some(operand);
            }
            None if pending.is_none() => {
                return Err(RemesPathError::eof("an expression", tokens.cursor()));
            }
            _ => break,
        }
    }

    let Some(operand) = pending else {
        return Err(RemesPathError::eof("an expression", tokens.cursor()));
    };
    match root {
        None => Ok(operand),
        Some(mut node) => {
            node.complete(operand);
            node.resolve()
        }
    }
}

/// Apply the registered unary-minus function (vectorized negation).
fn negate(value: Json) -> Result<Json, RemesPathError> {
    resolve_function_call(&FUNCTIONS["-"], vec![value])
}

/// Parses one atom (a parenthesized sub-query, a function call, or a
/// literal / late-bound reference) and its trailing indexer chain.
fn parse_expr_or_scalar(tokens: &mut TokenStream) -> Result<Json, RemesPathError> {
    let token_index = tokens.cursor();
    let Some(token) = tokens.advance() else {
        return Err(RemesPathError::eof("an expression", token_index));
    };
    let value = match token {
        Token::LParen { .. } => {
            let inner = parse_expr_or_scalar_func(tokens)?;
            match tokens.advance() {
                Some(Token::RParen { .. }) => inner,
                other => {
                    return Err(RemesPathError::parse(
                        format!("unclosed parenthesis: expected ')', got {}", describe(&other)),
                        tokens.cursor(),
                    ))
                }
            }
        }
        Token::Function { func, .. } => parse_arg_function(tokens, func, token_index)?,
        Token::Value { value, .. } => value,
        other => {
            return Err(RemesPathError::parse(
                format!("expected an expression, got {}", other.describe()),
                token_index,
            ))
        }
    };

    let mut indexers = vec![];
    while matches!(
        tokens.lookahead(0),
        Some(
            Token::Dot { .. }
                | Token::DotDot { .. }
                | Token::LBracket { .. }
                | Token::LBrace { .. }
        )
    ) {
        indexers.push(parse_indexer(tokens)?);
    }
    if indexers.is_empty() {
        return Ok(value);
    }

    let out_type = match indexers.last() {
        Some(Indexer {
            kind: IndexerKind::Projection(projection),
            ..
        }) => projection.out_type(),
        _ => Dtype::UNKNOWN,
    };
    match value {
        Json::CurJson(cur) => Ok(Json::CurJson(CurJson::new(out_type, move |input| {
            let current = cur.apply(input)?;
            apply_indexers(&current, &indexers)
        }))),
        constant => apply_indexers(&constant, &indexers),
    }
}

fn parse_indexer(tokens: &mut TokenStream) -> Result<Indexer, RemesPathError> {
    match tokens.advance() {
        Some(Token::Dot { .. }) => parse_dot_member(tokens, false),
        Some(Token::DotDot { .. }) => {
            if matches!(tokens.lookahead(0), Some(Token::LBracket { .. })) {
                tokens.advance();
                parse_bracket_indexer(tokens, true)
            } else {
                parse_dot_member(tokens, true)
            }
        }
        Some(Token::LBracket { .. }) => parse_bracket_indexer(tokens, false),
        Some(Token::LBrace { .. }) => parse_projection(tokens),
        other => Err(RemesPathError::parse(
            format!("expected an indexer, got {}", describe(&other)),
            tokens.cursor(),
        )),
    }
}

/// The member selector after `.` or `..`: a key, a regex, or `*`.
fn parse_dot_member(tokens: &mut TokenStream, recursive: bool) -> Result<Indexer, RemesPathError> {
    let token_index = tokens.cursor();
    match tokens.advance() {
        Some(Token::Word { value, .. }) => Ok(Indexer::varnames(vec![Json::Str(value)], recursive)),
        // a key that happens to collide with a function name is still a key
        Some(Token::Function { func, .. }) => Ok(Indexer::varnames(
            vec![Json::Str(func.name.to_owned())],
            recursive,
        )),
        Some(Token::Value {
            value: value @ (Json::Str(_) | Json::Regex(_)),
            ..
        }) => Ok(Indexer::varnames(vec![value], recursive)),
        Some(Token::Binop { op, .. }) if op.name == "*" => {
            if recursive {
                Err(RemesPathError::NotImplemented {
                    message: "recursive search with the star indexer".to_owned(),
                })
            } else {
                Ok(Indexer::star())
            }
        }
        other => Err(RemesPathError::parse(
            format!("expected a key, regex or '*', got {}", describe(&other)),
            token_index,
        )),
    }
}

/// The body of a `[...]` indexer, after the opening bracket: `*`, a list of
/// keys/regexes, a list of ints/slices, or a single boolean filter.
fn parse_bracket_indexer(
    tokens: &mut TokenStream,
    recursive: bool,
) -> Result<Indexer, RemesPathError> {
    let start_index = tokens.cursor();

    if matches!(tokens.lookahead(0), Some(Token::Binop { op, .. }) if op.name == "*") {
        tokens.advance();
        return match tokens.advance() {
            Some(Token::RBracket { .. }) => {
                if recursive {
                    Err(RemesPathError::NotImplemented {
                        message: "recursive search with the star indexer".to_owned(),
                    })
                } else {
                    Ok(Indexer::star())
                }
            }
            other => Err(RemesPathError::parse(
                format!("expected ']' after '*', got {}", describe(&other)),
                tokens.cursor(),
            )),
        };
    }

    let mut members = vec![];
    loop {
        members.push(parse_slicer_or_expr(tokens)?);
        match tokens.advance() {
            Some(Token::Comma { .. }) => {}
            Some(Token::RBracket { .. }) => break,
            other => {
                return Err(RemesPathError::parse(
                    format!(
                        "expected ',' or ']' in a bracket indexer, got {}",
                        describe(&other)
                    ),
                    tokens.cursor(),
                ))
            }
        }
    }

    if members
        .iter()
        .all(|m| matches!(m, Json::Str(_) | Json::Regex(_)))
    {
        return Ok(Indexer::varnames(members, recursive));
    }
    if members
        .iter()
        .all(|m| matches!(m, Json::Int(_) | Json::Slice(_)))
    {
        return if recursive {
            Err(RemesPathError::NotImplemented {
                message: "recursive search for array indices and slices".to_owned(),
            })
        } else {
            Ok(Indexer::slicers(members))
        };
    }
    if members.len() == 1 {
        let filter = members.remove(0);
        let is_boolean = match &filter {
            Json::Bool(_) => true,
            Json::CurJson(cur) => cur
                .dtype()
                .intersects(Dtype::BOOL | Dtype::ITERABLE | Dtype::UNKNOWN),
            _ => false,
        };
        if is_boolean {
            return if recursive {
                Err(RemesPathError::NotImplemented {
                    message: "recursive search with a boolean index".to_owned(),
                })
            } else {
                Ok(Indexer::filter(filter))
            };
        }
        return Err(RemesPathError::parse(
            format!(
                "a bracket indexer must hold keys, ints/slices, or a boolean expression; got {}",
                filter.type_name()
            ),
            start_index,
        ));
    }
    Err(RemesPathError::parse(
        "a bracket indexer cannot mix string keys with ints and slices",
        start_index,
    ))
}

/// One bracket-list member: either a full sub-expression or a
/// colon-separated slicer whose bounds are constant ints.
fn parse_slicer_or_expr(tokens: &mut TokenStream) -> Result<Json, RemesPathError> {
    if matches!(tokens.lookahead(0), Some(Token::Colon { .. })) {
        return parse_slicer(tokens, None);
    }
    let token_index = tokens.cursor();
    let value = parse_expr_or_scalar_func(tokens)?;
    if matches!(tokens.lookahead(0), Some(Token::Colon { .. })) {
        let Json::Int(start) = value else {
            return Err(RemesPathError::parse(
                format!("slice bounds must be ints, got {}", value.type_name()),
                token_index,
            ));
        };
        return parse_slicer(tokens, Some(start));
    }
    Ok(value)
}

/// The remainder of a slicer; the cursor is on the first ':'.
fn parse_slicer(tokens: &mut TokenStream, start: Option<i64>) -> Result<Json, RemesPathError> {
    let token_index = tokens.cursor();
    let mut parts = [start, None, None];
    let mut slot = 1;
    while slot <= 2 && matches!(tokens.lookahead(0), Some(Token::Colon { .. })) {
        tokens.advance();
        let empty_slot = matches!(
            tokens.lookahead(0),
            Some(
                Token::Colon { .. }
                    | Token::RBracket { .. }
                    | Token::Comma { .. }
                    | Token::RParen { .. }
            ) | None
        );
        if !empty_slot {
            let bound_index = tokens.cursor();
            let bound = parse_expr_or_scalar_func(tokens)?;
            let Json::Int(bound) = bound else {
                return Err(RemesPathError::parse(
                    format!("slice bounds must be ints, got {}", bound.type_name()),
                    bound_index,
                ));
            };
            parts[slot] = Some(bound);
        }
        slot += 1;
    }
    JsonSlice::new(parts[0], parts[1], parts[2])
        .map(Json::Slice)
        .map_err(|_| RemesPathError::parse("slice step cannot be 0", token_index))
}

/// A function call after its name: `(`, up to max-arity comma-separated
/// arguments, `)`. Each argument's type tag is intersected with the
/// position's permitted set; short calls are padded with nulls.
fn parse_arg_function(
    tokens: &mut TokenStream,
    func: &'static ArgFunction,
    fn_index: usize,
) -> Result<Json, RemesPathError> {
    match tokens.advance() {
        Some(Token::LParen { .. }) => {}
        other => {
            return Err(RemesPathError::parse(
                format!(
                    "expected '(' after function '{}', got {}",
                    func.name,
                    describe(&other)
                ),
                fn_index,
            ))
        }
    }

    let mut args: Vec<Json> = vec![];
    if matches!(tokens.lookahead(0), Some(Token::RParen { .. })) {
        tokens.advance();
    } else {
        loop {
            let arg_index = tokens.cursor();
            let allowed = func.arg_type(args.len());
            let arg = if allowed.intersects(Dtype::SLICE) {
                parse_slicer_or_expr(tokens)?
            } else {
                parse_expr_or_scalar_func(tokens)?
            };

            let dtype = arg.dtype();
            if !(dtype.intersects(allowed) || dtype.intersects(Dtype::UNKNOWN)) {
                return Err(RemesPathError::parse(
                    format!(
                        "function '{}' argument {}: expected {}, got {}",
                        func.name,
                        args.len(),
                        allowed.describe(),
                        dtype.describe()
                    ),
                    arg_index,
                ));
            }
            args.push(arg);

            match tokens.advance() {
                Some(Token::Comma { .. }) => {
                    if args.len() == func.max_args {
                        return Err(RemesPathError::parse(
                            format!(
                                "function '{}' takes at most {} arguments",
                                func.name, func.max_args
                            ),
                            tokens.cursor(),
                        ));
                    }
                }
                Some(Token::RParen { .. }) => break,
                other => {
                    return Err(RemesPathError::parse(
                        format!(
                            "expected ',' or ')' in call to '{}', got {}",
                            func.name,
                            describe(&other)
                        ),
                        tokens.cursor(),
                    ))
                }
            }
        }
    }

    if args.len() < func.min_args {
        return Err(RemesPathError::parse(
            format!(
                "function '{}' takes at least {} arguments, got {}",
                func.name, func.min_args, args.len()
            ),
            fn_index,
        ));
    }
    if func.max_args != VARIADIC {
        while args.len() < func.max_args {
            args.push(Json::Null);
        }
    }
    resolve_function_call(func, args)
}

/// The body of a `{...}` projection: either comma-separated values (array
/// projection) or string-keyed `key: value` pairs (object projection).
fn parse_projection(tokens: &mut TokenStream) -> Result<Indexer, RemesPathError> {
    let start_index = tokens.cursor();
    if matches!(tokens.lookahead(0), Some(Token::RBrace { .. })) {
        return Err(RemesPathError::parse("empty projection", start_index));
    }

    let keyed = matches!(
        (tokens.lookahead(0), tokens.lookahead(1)),
        (
            Some(
                Token::Word { .. }
                    | Token::Function { .. }
                    | Token::Value {
                        value: Json::Str(_),
                        ..
                    }
            ),
            Some(Token::Colon { .. })
        )
    );

    if keyed {
        let mut pairs = vec![];
        loop {
            let key_index = tokens.cursor();
            let key = match tokens.advance() {
                Some(Token::Word { value, .. }) => value,
                Some(Token::Function { func, .. }) => func.name.to_owned(),
                Some(Token::Value {
                    value: Json::Str(s),
                    ..
                }) => s,
                other => {
                    return Err(RemesPathError::parse(
                        format!("projection keys must be strings, got {}", describe(&other)),
                        key_index,
                    ))
                }
            };
            match tokens.advance() {
                Some(Token::Colon { .. }) => {}
                other => {
                    return Err(RemesPathError::parse(
                        format!("expected ':' after projection key, got {}", describe(&other)),
                        tokens.cursor(),
                    ))
                }
            }
            pairs.push((key, parse_expr_or_scalar_func(tokens)?));
            match tokens.advance() {
                Some(Token::Comma { .. }) => {}
                Some(Token::RBrace { .. }) => break,
                other => {
                    return Err(RemesPathError::parse(
                        format!("expected ',' or '}}' in a projection, got {}", describe(&other)),
                        tokens.cursor(),
                    ))
                }
            }
        }
        return Ok(Indexer::projection(Projection::Object(pairs)));
    }

    let mut items = vec![];
    loop {
        items.push(parse_expr_or_scalar_func(tokens)?);
        match tokens.advance() {
            Some(Token::Comma { .. }) => {}
            Some(Token::RBrace { .. }) => break,
            Some(Token::Colon { .. }) => {
                return Err(RemesPathError::parse(
                    "projection keys must be strings",
                    tokens.cursor(),
                ))
            }
            other => {
                return Err(RemesPathError::parse(
                    format!("expected ',' or '}}' in a projection, got {}", describe(&other)),
                    tokens.cursor(),
                ))
            }
        }
    }
    Ok(Indexer::projection(Projection::Array(items)))
}

fn describe(token: &Option<Token>) -> String {
    match token {
        Some(token) => token.describe(),
        None => "end of query".to_owned(),
    }
}
