//! The binary operator registry.
//!
//! Every binop carries its symbol, numeric precedence, associativity and the
//! scalar semantics; the vectorization over iterables lives in the
//! evaluator. [`Binop::out_type`] is the static type-resolution table the
//! parser consults when it attaches an output tag to a binop subtree.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RemesPathError;
use crate::json::{Dtype, Json};

pub type BinopFn = fn(&Json, &Json) -> Result<Json, RemesPathError>;

/// A binary infix operator defined on scalar operands.
#[derive(Debug)]
pub struct Binop {
    pub name: &'static str,
    pub precedence: f64,
    pub is_right_associative: bool,
    pub function: BinopFn,
}

impl Binop {
    /// Comparison operators always produce a bool.
    pub fn is_boolean(&self) -> bool {
        matches!(self.name, "==" | "!=" | "<" | "<=" | ">" | ">=" | "=~")
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(self.name, "&" | "|" | "^")
    }

    /// Static output type of this binop applied to operands with the given
    /// tags. An `Err` here is a compile-time type error; the parser attaches
    /// the offending token index.
    pub fn out_type(&self, left: Dtype, right: Dtype) -> Result<Dtype, String> {
        if left.intersects(Dtype::UNKNOWN) || right.intersects(Dtype::UNKNOWN) {
            return Ok(Dtype::UNKNOWN);
        }
        if left.intersects(Dtype::ITERABLE) || right.intersects(Dtype::ITERABLE) {
            let left_container = left & Dtype::ITERABLE;
            let right_container = right & Dtype::ITERABLE;
            if !left_container.is_empty()
                && !right_container.is_empty()
                && left_container != right_container
            {
                return Err(format!(
                    "'{}' cannot mix an array operand with an object operand",
                    self.name
                ));
            }
            return Ok(left_container | right_container);
        }
        if self.is_boolean() {
            return Ok(Dtype::BOOL);
        }
        if self.is_bitwise() {
            if (left | right).intersects(Dtype::FLOAT) {
                return Err(format!("bitwise '{}' is not defined on floats", self.name));
            }
            require_operands(self.name, left, right, Dtype::BOOL | Dtype::INT)?;
            return Ok(if left == Dtype::BOOL && right == Dtype::BOOL {
                Dtype::BOOL
            } else {
                Dtype::INT
            });
        }

        match self.name {
            "/" | "**" | "-**" => {
                require_operands(self.name, left, right, Dtype::BOOL | Dtype::NUM)?;
                Ok(Dtype::FLOAT)
            }
            "//" => {
                require_operands(self.name, left, right, Dtype::BOOL | Dtype::NUM)?;
                Ok(Dtype::INT)
            }
            _ => {
                if self.name == "+" && left == Dtype::STR && right == Dtype::STR {
                    return Ok(Dtype::STR);
                }
                if left == Dtype::BOOL && right == Dtype::BOOL {
                    return Err(format!(
                        "arithmetic '{}' is not defined on two booleans",
                        self.name
                    ));
                }
                require_operands(self.name, left, right, Dtype::BOOL | Dtype::NUM)?;
                let int_like = Dtype::BOOL | Dtype::INT;
                Ok(if int_like.contains(left) && int_like.contains(right) {
                    Dtype::INT
                } else {
                    Dtype::FLOAT
                })
            }
        }
    }
}

fn require_operands(name: &str, left: Dtype, right: Dtype, allowed: Dtype) -> Result<(), String> {
    if allowed.contains(left) && allowed.contains(right) {
        Ok(())
    } else {
        Err(format!(
            "'{name}' cannot operate on {} and {}",
            left.describe(),
            right.describe()
        ))
    }
}

macro_rules! binop {
    ($map:ident, $name:expr, $precedence:expr, $function:expr) => {
        $map.insert(
            $name,
            Binop {
                name: $name,
                precedence: $precedence,
                is_right_associative: false,
                function: $function,
            },
        );
    };
}

/// All binops addressable from a query, keyed by symbol.
pub static BINOPS: Lazy<HashMap<&'static str, Binop>> = Lazy::new(|| {
    let mut m = HashMap::new();

    binop!(m, "|", 0.0, bitwise_or);
    binop!(m, "^", 1.0, bitwise_xor);
    binop!(m, "&", 2.0, bitwise_and);
    binop!(m, "==", 3.0, equals);
    binop!(m, "!=", 3.0, not_equals);
    binop!(m, "<", 3.0, less_than);
    binop!(m, "<=", 3.0, less_than_or_equal);
    binop!(m, ">", 3.0, greater_than);
    binop!(m, ">=", 3.0, greater_than_or_equal);
    binop!(m, "=~", 3.0, has_pattern);
    binop!(m, "+", 4.0, add);
    binop!(m, "-", 4.0, subtract);
    binop!(m, "*", 5.0, multiply);
    binop!(m, "/", 5.0, divide);
    binop!(m, "//", 5.0, floor_divide);
    binop!(m, "%", 5.0, modulo);
    m.insert(
        "**",
        Binop {
            name: "**",
            precedence: 6.0,
            is_right_associative: true,
            function: power,
        },
    );

    m
});

/// Synthetic negate-then-power binop. The parser substitutes it for `**`
/// when a pending unary minus precedes the base, so that `-x ** y` means
/// `(-x) ** y` and unary minus binds tighter than exponentiation.
pub static NEG_POW: Binop = Binop {
    name: "-**",
    precedence: 6.0,
    is_right_associative: true,
    function: negated_power,
};

/// Numeric view of a scalar; a lone bool counts as 0 or 1.
fn num_value(value: &Json) -> Option<f64> {
    match value {
        Json::Bool(b) => Some(*b as i64 as f64),
        Json::Int(i) => Some(*i as f64),
        Json::Float(x) => Some(*x),
        _ => None,
    }
}

fn int_value(value: &Json) -> Option<i64> {
    match value {
        Json::Bool(b) => Some(*b as i64),
        Json::Int(i) => Some(*i),
        _ => None,
    }
}

fn mismatch(name: &str, left: &Json, right: &Json) -> RemesPathError {
    RemesPathError::Type {
        message: format!(
            "binop '{name}' cannot operate on {} and {}",
            left.type_name(),
            right.type_name()
        ),
    }
}

fn both_bools(name: &str, left: &Json, right: &Json) -> Result<(), RemesPathError> {
    if matches!((left, right), (Json::Bool(_), Json::Bool(_))) {
        Err(RemesPathError::Type {
            message: format!("arithmetic '{name}' is not defined on two booleans"),
        })
    } else {
        Ok(())
    }
}

fn add(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    if let (Json::Str(a), Json::Str(b)) = (left, right) {
        return Ok(Json::Str(format!("{a}{b}")));
    }
    both_bools("+", left, right)?;
    match (int_value(left), int_value(right)) {
        (Some(a), Some(b)) => Ok(Json::Int(a.wrapping_add(b))),
        _ => match (num_value(left), num_value(right)) {
            (Some(a), Some(b)) => Ok(Json::Float(a + b)),
            _ => Err(mismatch("+", left, right)),
        },
    }
}

fn subtract(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("-", left, right)?;
    match (int_value(left), int_value(right)) {
        (Some(a), Some(b)) => Ok(Json::Int(a.wrapping_sub(b))),
        _ => match (num_value(left), num_value(right)) {
            (Some(a), Some(b)) => Ok(Json::Float(a - b)),
            _ => Err(mismatch("-", left, right)),
        },
    }
}

fn multiply(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("*", left, right)?;
    match (int_value(left), int_value(right)) {
        (Some(a), Some(b)) => Ok(Json::Int(a.wrapping_mul(b))),
        _ => match (num_value(left), num_value(right)) {
            (Some(a), Some(b)) => Ok(Json::Float(a * b)),
            _ => Err(mismatch("*", left, right)),
        },
    }
}

fn divide(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("/", left, right)?;
    match (num_value(left), num_value(right)) {
        (Some(a), Some(b)) => Ok(Json::Float(a / b)),
        _ => Err(mismatch("/", left, right)),
    }
}

fn floor_divide(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("//", left, right)?;
    match (num_value(left), num_value(right)) {
        (Some(_), Some(b)) if b == 0.0 => Err(RemesPathError::Type {
            message: "integer division by zero".to_owned(),
        }),
        (Some(a), Some(b)) => Ok(Json::Int((a / b).floor() as i64)),
        _ => Err(mismatch("//", left, right)),
    }
}

fn modulo(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("%", left, right)?;
    match (int_value(left), int_value(right)) {
        (Some(_), Some(0)) => Err(RemesPathError::Type {
            message: "modulo by zero".to_owned(),
        }),
        (Some(a), Some(b)) => Ok(Json::Int(a.wrapping_rem(b))),
        _ => match (num_value(left), num_value(right)) {
            (Some(a), Some(b)) => Ok(Json::Float(a % b)),
            _ => Err(mismatch("%", left, right)),
        },
    }
}

fn power(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("**", left, right)?;
    match (num_value(left), num_value(right)) {
        (Some(a), Some(b)) => Ok(Json::Float(a.powf(b))),
        _ => Err(mismatch("**", left, right)),
    }
}

fn negated_power(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    both_bools("-**", left, right)?;
    match (num_value(left), num_value(right)) {
        (Some(a), Some(b)) => Ok(Json::Float((-a).powf(b))),
        _ => Err(mismatch("-**", left, right)),
    }
}

/// Scalar equality with numeric coercion: `1 == 1.0` is true, values of
/// different non-numeric kinds are unequal rather than an error.
fn scalar_equals(left: &Json, right: &Json) -> bool {
    if let (Some(a), Some(b)) = (num_value(left), num_value(right)) {
        return a == b;
    }
    match (left, right) {
        (Json::Str(a), Json::Str(b)) => a == b,
        (Json::Null, Json::Null) => true,
        _ => false,
    }
}

fn equals(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    Ok(Json::Bool(scalar_equals(left, right)))
}

fn not_equals(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    Ok(Json::Bool(!scalar_equals(left, right)))
}

fn compare(
    name: &'static str,
    left: &Json,
    right: &Json,
    accept: fn(std::cmp::Ordering) -> bool,
) -> Result<Json, RemesPathError> {
    match (left, right) {
        (Json::Str(a), Json::Str(b)) => Ok(Json::Bool(accept(a.cmp(b)))),
        _ => match (num_value(left), num_value(right)) {
            (Some(a), Some(b)) => Ok(Json::Bool(a.partial_cmp(&b).map(accept).unwrap_or(false))),
            _ => Err(mismatch(name, left, right)),
        },
    }
}

fn less_than(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    compare("<", left, right, |o| o.is_lt())
}

fn less_than_or_equal(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    compare("<=", left, right, |o| o.is_le())
}

fn greater_than(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    compare(">", left, right, |o| o.is_gt())
}

fn greater_than_or_equal(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    compare(">=", left, right, |o| o.is_ge())
}

fn has_pattern(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    let Json::Str(s) = left else {
        return Err(mismatch("=~", left, right));
    };
    match right {
        Json::Regex(re) => Ok(Json::Bool(re.regex().is_match(s))),
        Json::Str(pattern) => {
            let re = Regex::new(pattern).map_err(|e| RemesPathError::Type {
                message: format!("right operand of '=~' is not a valid regex: {e}"),
            })?;
            Ok(Json::Bool(re.is_match(s)))
        }
        _ => Err(mismatch("=~", left, right)),
    }
}

fn bitwise(
    name: &'static str,
    left: &Json,
    right: &Json,
    on_bools: fn(bool, bool) -> bool,
    on_ints: fn(i64, i64) -> i64,
) -> Result<Json, RemesPathError> {
    if matches!(left, Json::Float(_)) || matches!(right, Json::Float(_)) {
        return Err(RemesPathError::Type {
            message: format!("bitwise '{name}' is not defined on floats"),
        });
    }
    match (left, right) {
        (Json::Bool(a), Json::Bool(b)) => Ok(Json::Bool(on_bools(*a, *b))),
        _ => match (int_value(left), int_value(right)) {
            (Some(a), Some(b)) => Ok(Json::Int(on_ints(a, b))),
            _ => Err(mismatch(name, left, right)),
        },
    }
}

fn bitwise_and(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    bitwise("&", left, right, |a, b| a & b, |a, b| a & b)
}

fn bitwise_or(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    bitwise("|", left, right, |a, b| a | b, |a, b| a | b)
}

fn bitwise_xor(left: &Json, right: &Json) -> Result<Json, RemesPathError> {
    bitwise("^", left, right, |a, b| a ^ b, |a, b| a ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str) -> &'static Binop {
        BINOPS.get(name).unwrap()
    }

    fn run(name: &str, left: Json, right: Json) -> Json {
        (op(name).function)(&left, &right).unwrap()
    }

    #[test]
    fn test_precedence_table() {
        assert!(op("|").precedence < op("^").precedence);
        assert!(op("^").precedence < op("&").precedence);
        assert!(op("&").precedence < op("==").precedence);
        assert!(op("==").precedence < op("+").precedence);
        assert!(op("+").precedence < op("*").precedence);
        assert!(op("*").precedence < op("**").precedence);
        assert!(op("**").is_right_associative);
        assert!(NEG_POW.is_right_associative);
        assert_eq!(op("**").precedence, NEG_POW.precedence);
    }

    #[test]
    fn test_arithmetic_scalars() {
        assert_eq!(run("+", Json::Int(2), Json::Int(3)), Json::Int(5));
        assert_eq!(run("+", Json::Int(2), Json::Float(3.5)), Json::Float(5.5));
        assert_eq!(
            run("+", Json::Str("ab".into()), Json::Str("cd".into())),
            Json::Str("abcd".into())
        );
        assert_eq!(run("/", Json::Int(1), Json::Int(2)), Json::Float(0.5));
        assert_eq!(run("//", Json::Int(-7), Json::Int(2)), Json::Int(-4));
        assert_eq!(run("**", Json::Int(2), Json::Int(10)), Json::Float(1024.0));
        assert_eq!(
            (NEG_POW.function)(&Json::Int(2), &Json::Int(2)).unwrap(),
            Json::Float(4.0)
        );
        assert_eq!(run("%", Json::Int(7), Json::Int(3)), Json::Int(1));
    }

    #[test]
    fn test_arithmetic_on_two_bools_is_an_error() {
        let err = (op("+").function)(&Json::Bool(true), &Json::Bool(false)).unwrap_err();
        assert!(matches!(err, RemesPathError::Type { .. }));
        // a lone bool acts as an int
        assert_eq!(run("+", Json::Bool(true), Json::Int(2)), Json::Int(3));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("<", Json::Int(1), Json::Float(1.5)), Json::Bool(true));
        assert_eq!(run(">=", Json::Int(2), Json::Int(2)), Json::Bool(true));
        assert_eq!(
            run("<", Json::Str("abc".into()), Json::Str("abd".into())),
            Json::Bool(true)
        );
        assert_eq!(run("==", Json::Int(1), Json::Float(1.0)), Json::Bool(true));
        assert_eq!(run("!=", Json::Null, Json::Int(0)), Json::Bool(true));
        assert_eq!(run("==", Json::Null, Json::Null), Json::Bool(true));
    }

    #[test]
    fn test_has_pattern() {
        let re = Json::Regex(crate::json::JsonRegex::new(Regex::new(r"\d+").unwrap()));
        assert_eq!(run("=~", Json::Str("ab3".into()), re), Json::Bool(true));
        assert_eq!(
            run("=~", Json::Str("abc".into()), Json::Str("b".into())),
            Json::Bool(true)
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(run("&", Json::Int(6), Json::Int(3)), Json::Int(2));
        assert_eq!(run("|", Json::Bool(true), Json::Bool(false)), Json::Bool(true));
        assert_eq!(run("^", Json::Bool(true), Json::Bool(true)), Json::Bool(false));
        let err = (op("|").function)(&Json::Float(1.0), &Json::Int(1)).unwrap_err();
        assert!(matches!(err, RemesPathError::Type { .. }));
    }

    #[test]
    fn test_out_type_table() {
        let plus = op("+");
        assert_eq!(plus.out_type(Dtype::INT, Dtype::INT), Ok(Dtype::INT));
        assert_eq!(plus.out_type(Dtype::INT, Dtype::FLOAT), Ok(Dtype::FLOAT));
        assert_eq!(plus.out_type(Dtype::STR, Dtype::STR), Ok(Dtype::STR));
        assert!(plus.out_type(Dtype::STR, Dtype::INT).is_err());
        assert!(plus.out_type(Dtype::BOOL, Dtype::BOOL).is_err());

        assert_eq!(plus.out_type(Dtype::ARR, Dtype::INT), Ok(Dtype::ARR));
        assert_eq!(plus.out_type(Dtype::OBJ, Dtype::OBJ), Ok(Dtype::OBJ));
        assert!(plus.out_type(Dtype::ARR, Dtype::OBJ).is_err());
        assert_eq!(plus.out_type(Dtype::UNKNOWN, Dtype::INT), Ok(Dtype::UNKNOWN));

        assert_eq!(op("<").out_type(Dtype::INT, Dtype::FLOAT), Ok(Dtype::BOOL));
        assert_eq!(op("/").out_type(Dtype::INT, Dtype::INT), Ok(Dtype::FLOAT));
        assert_eq!(op("//").out_type(Dtype::FLOAT, Dtype::INT), Ok(Dtype::INT));
        assert!(op("&").out_type(Dtype::FLOAT, Dtype::INT).is_err());
        assert_eq!(op("&").out_type(Dtype::BOOL, Dtype::BOOL), Ok(Dtype::BOOL));
        assert_eq!(op("&").out_type(Dtype::INT, Dtype::BOOL), Ok(Dtype::INT));
    }
}
