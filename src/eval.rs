//! Evaluator: late-binding resolution and vectorization.
//!
//! The parser decides statically whether each construct depends on the
//! input; everything that does is wrapped in a [`CurJson`] closure built
//! here. At evaluation time [`apply`] only has to call the top-level
//! closure.

use indexmap::IndexMap;

use crate::binop::Binop;
use crate::error::RemesPathError;
use crate::functions::ArgFunction;
use crate::json::{CurJson, Dtype, Json};

/// Apply a compiled query to an input. A constant query ignores the input.
pub fn apply(compiled: &Json, input: &Json) -> Result<Json, RemesPathError> {
    match compiled {
        Json::CurJson(cur) => cur.apply(input),
        constant => Ok(constant.clone()),
    }
}

/// Combine a binop with its compiled operands: computed immediately when
/// both are concrete, deferred through a closure over the input when either
/// is late-bound.
pub(crate) fn resolve_binop(
    op: &'static Binop,
    left: Json,
    right: Json,
    out_type: Dtype,
) -> Result<Json, RemesPathError> {
    match (left, right) {
        (Json::CurJson(left), Json::CurJson(right)) => {
            Ok(Json::CurJson(CurJson::new(out_type, move |input| {
                let left = left.apply(input)?;
                let right = right.apply(input)?;
                eval_binop(op, &left, &right)
            })))
        }
        (Json::CurJson(left), right) => Ok(Json::CurJson(CurJson::new(out_type, move |input| {
            let left = left.apply(input)?;
            eval_binop(op, &left, &right)
        }))),
        (left, Json::CurJson(right)) => Ok(Json::CurJson(CurJson::new(out_type, move |input| {
            let right = right.apply(input)?;
            eval_binop(op, &left, &right)
        }))),
        (left, right) => eval_binop(op, &left, &right),
    }
}

/// Vectorized application of a scalar binop. Two iterables must have the
/// same shape (equal lengths for arrays, equal key sets for objects); a
/// scalar broadcasts across the other side's elements, recursing into
/// nested containers.
pub(crate) fn eval_binop(
    op: &'static Binop,
    left: &Json,
    right: &Json,
) -> Result<Json, RemesPathError> {
    match (left, right) {
        (Json::Array(a), Json::Array(b)) => {
            if a.len() != b.len() {
                return Err(RemesPathError::VectorizedArithmetic {
                    message: format!(
                        "binop '{}' on arrays of different lengths ({} and {})",
                        op.name,
                        a.len(),
                        b.len()
                    ),
                });
            }
            let mut out = Vec::with_capacity(a.len());
            for (x, y) in a.iter().zip(b) {
                out.push(eval_binop(op, x, y)?);
            }
            Ok(Json::Array(out))
        }
        (Json::Object(a), Json::Object(b)) => {
            if a.len() != b.len() || !a.keys().all(|k| b.contains_key(k)) {
                return Err(RemesPathError::VectorizedArithmetic {
                    message: format!("binop '{}' on objects with different key sets", op.name),
                });
            }
            let mut out = IndexMap::with_capacity(a.len());
            for (key, x) in a {
                out.insert(key.clone(), eval_binop(op, x, &b[key])?);
            }
            Ok(Json::Object(out))
        }
        (Json::Array(_), Json::Object(_)) | (Json::Object(_), Json::Array(_)) => {
            Err(RemesPathError::VectorizedArithmetic {
                message: format!("binop '{}' cannot mix an array and an object", op.name),
            })
        }
        (Json::Array(a), scalar) => {
            let mut out = Vec::with_capacity(a.len());
            for x in a {
                out.push(eval_binop(op, x, scalar)?);
            }
            Ok(Json::Array(out))
        }
        (Json::Object(a), scalar) => {
            let mut out = IndexMap::with_capacity(a.len());
            for (key, x) in a {
                out.insert(key.clone(), eval_binop(op, x, scalar)?);
            }
            Ok(Json::Object(out))
        }
        (scalar, Json::Array(b)) => {
            let mut out = Vec::with_capacity(b.len());
            for y in b {
                out.push(eval_binop(op, scalar, y)?);
            }
            Ok(Json::Array(out))
        }
        (scalar, Json::Object(b)) => {
            let mut out = IndexMap::with_capacity(b.len());
            for (key, y) in b {
                out.insert(key.clone(), eval_binop(op, scalar, y)?);
            }
            Ok(Json::Object(out))
        }
        (left, right) => (op.function)(left, right),
    }
}

/// Combine a registry function with its compiled arguments, deferring
/// through a closure when any argument is late-bound.
pub(crate) fn resolve_function_call(
    func: &'static ArgFunction,
    args: Vec<Json>,
) -> Result<Json, RemesPathError> {
    if args.iter().any(|arg| matches!(arg, Json::CurJson(_))) {
        let out_type = late_call_out_type(func, &args);
        Ok(Json::CurJson(CurJson::new(out_type, move |input| {
            let mut resolved = Vec::with_capacity(args.len());
            for arg in &args {
                resolved.push(apply(arg, input)?);
            }
            call_function(func, resolved)
        })))
    } else {
        call_function(func, args)
    }
}

/// The output tag of a deferred call: a vectorized call mirrors the
/// container shape of its first argument when that shape is known.
fn late_call_out_type(func: &'static ArgFunction, args: &[Json]) -> Dtype {
    if func.is_vectorized {
        let first = args[0].dtype();
        if first.intersects(Dtype::UNKNOWN) {
            return Dtype::UNKNOWN;
        }
        if first.intersects(Dtype::ITERABLE) {
            return first & Dtype::ITERABLE;
        }
    }
    func.out_type
}

/// Call a registry function on concrete arguments, mapping a vectorized
/// function element-wise over an iterable first argument.
pub(crate) fn call_function(
    func: &'static ArgFunction,
    mut args: Vec<Json>,
) -> Result<Json, RemesPathError> {
    if !func.is_vectorized || !args[0].is_iterable() {
        for (position, arg) in args.iter().enumerate() {
            check_arg(func, position, arg)?;
        }
        return (func.function)(&mut args);
    }

    for (position, arg) in args.iter().enumerate().skip(1) {
        check_arg(func, position, arg)?;
    }
    let first = args.remove(0);
    let rest = args;
    match first {
        Json::Array(elements) => {
            let mut out = Vec::with_capacity(elements.len());
            for element in elements {
                out.push(call_on_element(func, element, &rest)?);
            }
            Ok(Json::Array(out))
        }
        Json::Object(members) => {
            let mut out = IndexMap::with_capacity(members.len());
            for (key, element) in members {
                out.insert(key, call_on_element(func, element, &rest)?);
            }
            Ok(Json::Object(out))
        }
        other => {
            // not iterable after all; plain scalar call
            check_arg(func, 0, &other)?;
            let mut call_args = vec![other];
            call_args.extend(rest);
            (func.function)(&mut call_args)
        }
    }
}

fn call_on_element(
    func: &'static ArgFunction,
    element: Json,
    rest: &[Json],
) -> Result<Json, RemesPathError> {
    check_arg(func, 0, &element)?;
    let mut call_args = Vec::with_capacity(rest.len() + 1);
    call_args.push(element);
    call_args.extend(rest.iter().cloned());
    (func.function)(&mut call_args)
}

/// Runtime re-check of an argument against its declared type set. This is
/// where an unknown late-bound value that resolved to something its
/// consumer cannot accept is reported.
fn check_arg(func: &'static ArgFunction, position: usize, value: &Json) -> Result<(), RemesPathError> {
    let allowed = func.arg_type(position);
    if allowed.intersects(value.dtype()) {
        Ok(())
    } else {
        Err(RemesPathError::Type {
            message: format!(
                "function '{}' argument {}: expected {}, got {}",
                func.name,
                position,
                allowed.describe(),
                value.type_name()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binop::BINOPS;
    use crate::functions::FUNCTIONS;

    fn ints(values: &[i64]) -> Json {
        Json::Array(values.iter().map(|i| Json::Int(*i)).collect())
    }

    #[test]
    fn test_elementwise_and_broadcast() {
        let plus = BINOPS.get("+").unwrap();
        assert_eq!(
            eval_binop(plus, &ints(&[1, 2]), &ints(&[10, 20])).unwrap(),
            ints(&[11, 22])
        );
        assert_eq!(
            eval_binop(plus, &ints(&[1, 2]), &Json::Int(5)).unwrap(),
            ints(&[6, 7])
        );
        assert_eq!(
            eval_binop(plus, &Json::Int(5), &ints(&[1, 2])).unwrap(),
            ints(&[6, 7])
        );

        let a = Json::parse(r#"{"x": 1, "y": 2}"#).unwrap();
        let b = Json::parse(r#"{"y": 20, "x": 10}"#).unwrap();
        assert_eq!(
            eval_binop(plus, &a, &b).unwrap(),
            Json::parse(r#"{"x": 11, "y": 22}"#).unwrap()
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let plus = BINOPS.get("+").unwrap();
        let err = eval_binop(plus, &ints(&[1]), &ints(&[1, 2])).unwrap_err();
        assert!(matches!(err, RemesPathError::VectorizedArithmetic { .. }));

        let obj = Json::parse(r#"{"x": 1}"#).unwrap();
        let err = eval_binop(plus, &ints(&[1]), &obj).unwrap_err();
        assert!(matches!(err, RemesPathError::VectorizedArithmetic { .. }));

        let other = Json::parse(r#"{"y": 1}"#).unwrap();
        let err = eval_binop(plus, &obj, &other).unwrap_err();
        assert!(matches!(err, RemesPathError::VectorizedArithmetic { .. }));
    }

    #[test]
    fn test_nested_broadcast() {
        let times = BINOPS.get("*").unwrap();
        let nested = Json::Array(vec![ints(&[1, 2]), ints(&[3])]);
        assert_eq!(
            eval_binop(times, &nested, &Json::Int(2)).unwrap(),
            Json::Array(vec![ints(&[2, 4]), ints(&[6])])
        );
    }

    #[test]
    fn test_vectorized_function_dispatch() {
        let abs = FUNCTIONS.get("abs").unwrap();
        assert_eq!(
            call_function(abs, vec![ints(&[-1, 2])]).unwrap(),
            ints(&[1, 2])
        );
        // empty iterable in, empty iterable of the same shape out
        assert_eq!(
            call_function(abs, vec![Json::Array(vec![])]).unwrap(),
            Json::Array(vec![])
        );
        let obj = Json::parse(r#"{"x": -3}"#).unwrap();
        assert_eq!(
            call_function(abs, vec![obj]).unwrap(),
            Json::parse(r#"{"x": 3}"#).unwrap()
        );
    }

    #[test]
    fn test_runtime_type_check() {
        let abs = FUNCTIONS.get("abs").unwrap();
        let err = call_function(abs, vec![Json::Str("x".into())]).unwrap_err();
        assert!(matches!(err, RemesPathError::Type { .. }));
        let err = call_function(abs, vec![Json::Array(vec![Json::Str("x".into())])]).unwrap_err();
        assert!(matches!(err, RemesPathError::Type { .. }));
    }

    #[test]
    fn test_late_bound_function_call() {
        let abs = FUNCTIONS.get("abs").unwrap();
        let late = Json::CurJson(CurJson::identity());
        let compiled = resolve_function_call(abs, vec![late]).unwrap();
        assert!(matches!(compiled, Json::CurJson(_)));
        assert_eq!(apply(&compiled, &ints(&[-4, 4])).unwrap(), ints(&[4, 4]));
    }
}
