//! The built-in function registry.
//!
//! Every entry declares its arity range, the permitted type set of each
//! argument, its output tag, and whether it is vectorized (applied
//! element-wise over an iterable first argument). The vectorized dispatch
//! itself lives in the evaluator; the implementations here see scalars in
//! the first position of a vectorized call.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::mem;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::RemesPathError;
use crate::json::{Dtype, Json};

pub type ArgFunctionFn = fn(&mut [Json]) -> Result<Json, RemesPathError>;

/// Marker for an unbounded maximum arity. Variadic functions are not padded
/// with nulls.
pub const VARIADIC: usize = usize::MAX;

/// An entry in the function registry.
#[derive(Debug)]
pub struct ArgFunction {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    /// Permitted type set per argument position; the last entry repeats for
    /// the extra arguments of a variadic function.
    pub input_types: Vec<Dtype>,
    pub out_type: Dtype,
    pub is_vectorized: bool,
    /// True for functions that reorder or otherwise alter their (owned)
    /// argument in place. Callers that run such a query repeatedly against
    /// one document should clone the document per run.
    pub mutates_input: bool,
    pub function: ArgFunctionFn,
}

impl ArgFunction {
    pub fn arg_type(&self, position: usize) -> Dtype {
        self.input_types[position.min(self.input_types.len() - 1)]
    }
}

macro_rules! function {
    ($map:ident, $name:expr, $min:expr, $max:expr, $in_types:expr, $out:expr, $vectorized:expr, $func:expr) => {
        $map.insert(
            $name,
            ArgFunction {
                name: $name,
                min_args: $min,
                max_args: $max,
                input_types: $in_types,
                out_type: $out,
                is_vectorized: $vectorized,
                mutates_input: false,
                function: $func,
            },
        );
    };
}

/// All built-in functions, keyed by name. The unary-minus helper is
/// registered under `-`, a name no identifier can produce, so it is only
/// reachable through the parser.
pub static FUNCTIONS: Lazy<HashMap<&'static str, ArgFunction>> = Lazy::new(|| {
    let any = Dtype::ANYTHING;
    let num = Dtype::NUM;
    let opt_bool = Dtype::BOOL | Dtype::NULL;
    let opt_int = Dtype::INT | Dtype::NULL;
    let key_types = Dtype::STR | Dtype::INT;

    let mut m = HashMap::new();

    // reducing and whole-container functions
    function!(m, "len", 1, 1, vec![Dtype::ITERABLE], Dtype::INT, false, len);
    function!(m, "sum", 1, 1, vec![Dtype::ARR], Dtype::FLOAT, false, sum);
    function!(m, "mean", 1, 1, vec![Dtype::ARR], Dtype::FLOAT, false, mean);
    function!(m, "avg", 1, 1, vec![Dtype::ARR], Dtype::FLOAT, false, mean);
    function!(m, "min", 1, 1, vec![Dtype::ARR], Dtype::FLOAT, false, min_fn);
    function!(m, "max", 1, 1, vec![Dtype::ARR], Dtype::FLOAT, false, max_fn);
    function!(
        m,
        "range",
        1,
        3,
        vec![Dtype::INT, opt_int, opt_int],
        Dtype::ARR,
        false,
        range
    );
    function!(m, "keys", 1, 1, vec![Dtype::OBJ], Dtype::ARR, false, keys);
    function!(m, "values", 1, 1, vec![Dtype::OBJ], Dtype::ARR, false, values);
    function!(m, "items", 1, 1, vec![Dtype::OBJ], Dtype::ARR, false, items);
    function!(
        m,
        "unique",
        1,
        2,
        vec![Dtype::ARR, opt_bool],
        Dtype::ARR,
        false,
        unique
    );
    function!(
        m,
        "sorted",
        1,
        2,
        vec![Dtype::ARR, opt_bool],
        Dtype::ARR,
        false,
        sorted
    );
    m.insert(
        "sort",
        ArgFunction {
            name: "sort",
            min_args: 1,
            max_args: 2,
            input_types: vec![Dtype::ARR, opt_bool],
            out_type: Dtype::ARR,
            is_vectorized: false,
            mutates_input: true,
            function: sort,
        },
    );
    function!(
        m,
        "sort_by",
        2,
        3,
        vec![Dtype::ARR, key_types, opt_bool],
        Dtype::ARR,
        false,
        sort_by
    );
    function!(
        m,
        "max_by",
        2,
        2,
        vec![Dtype::ARR, key_types],
        Dtype::UNKNOWN,
        false,
        max_by
    );
    function!(
        m,
        "min_by",
        2,
        2,
        vec![Dtype::ARR, key_types],
        Dtype::UNKNOWN,
        false,
        min_by
    );
    function!(
        m,
        "flatten",
        1,
        2,
        vec![Dtype::ARR, opt_int],
        Dtype::ARR,
        false,
        flatten
    );
    function!(
        m,
        "index",
        2,
        3,
        vec![Dtype::ARR, Dtype::SCALAR, opt_bool],
        Dtype::INT,
        false,
        index_fn
    );
    function!(
        m,
        "in",
        2,
        2,
        vec![Dtype::SCALAR, Dtype::ITERABLE],
        Dtype::BOOL,
        false,
        in_fn
    );
    function!(
        m,
        "concat",
        2,
        VARIADIC,
        vec![Dtype::ITERABLE],
        Dtype::ITERABLE,
        false,
        concat
    );
    function!(m, "dict", 1, 1, vec![Dtype::ARR], Dtype::OBJ, false, dict);
    function!(
        m,
        "zip",
        2,
        VARIADIC,
        vec![Dtype::ARR],
        Dtype::ARR,
        false,
        zip
    );

    // vectorized scalar functions
    function!(m, "-", 1, 1, vec![num], Dtype::NUM, true, uminus);
    function!(m, "abs", 1, 1, vec![num], Dtype::NUM, true, abs);
    function!(
        m,
        "round",
        1,
        2,
        vec![num, opt_int],
        Dtype::NUM,
        true,
        round
    );
    function!(
        m,
        "log",
        1,
        2,
        vec![num, num | Dtype::NULL],
        Dtype::FLOAT,
        true,
        log
    );
    function!(m, "log2", 1, 1, vec![num], Dtype::FLOAT, true, log2);
    function!(m, "str", 1, 1, vec![any], Dtype::STR, true, str_fn);
    function!(
        m,
        "int",
        1,
        1,
        vec![Dtype::BOOL | Dtype::NUM | Dtype::STR],
        Dtype::INT,
        true,
        int_fn
    );
    function!(
        m,
        "float",
        1,
        1,
        vec![Dtype::BOOL | Dtype::NUM | Dtype::STR],
        Dtype::FLOAT,
        true,
        float_fn
    );
    function!(m, "not", 1, 1, vec![Dtype::BOOL], Dtype::BOOL, true, not_fn);
    function!(m, "isnull", 1, 1, vec![any], Dtype::BOOL, true, isnull);
    function!(m, "isnum", 1, 1, vec![any], Dtype::BOOL, true, isnum);
    function!(m, "is_expr", 1, 1, vec![any], Dtype::BOOL, true, is_expr);
    function!(
        m,
        "ifelse",
        3,
        3,
        vec![any, any, any],
        Dtype::UNKNOWN,
        true,
        ifelse
    );
    function!(m, "s_len", 1, 1, vec![Dtype::STR], Dtype::INT, true, s_len);
    function!(
        m,
        "s_mul",
        2,
        2,
        vec![Dtype::STR, Dtype::INT],
        Dtype::STR,
        true,
        s_mul
    );
    function!(
        m,
        "s_count",
        2,
        2,
        vec![Dtype::STR, Dtype::STR_OR_REGEX],
        Dtype::INT,
        true,
        s_count
    );
    function!(
        m,
        "s_find",
        2,
        2,
        vec![Dtype::STR, Dtype::REGEX],
        Dtype::ARR,
        true,
        s_find
    );
    function!(
        m,
        "s_split",
        1,
        2,
        vec![Dtype::STR, Dtype::STR_OR_REGEX | Dtype::NULL],
        Dtype::ARR,
        true,
        s_split
    );
    function!(
        m,
        "s_sub",
        3,
        3,
        vec![Dtype::STR, Dtype::STR_OR_REGEX, Dtype::STR],
        Dtype::STR,
        true,
        s_sub
    );
    function!(m, "s_upper", 1, 1, vec![Dtype::STR], Dtype::STR, true, s_upper);
    function!(m, "s_lower", 1, 1, vec![Dtype::STR], Dtype::STR, true, s_lower);
    function!(m, "s_strip", 1, 1, vec![Dtype::STR], Dtype::STR, true, s_strip);
    function!(
        m,
        "s_slice",
        2,
        2,
        vec![Dtype::STR, Dtype::INT_OR_SLICE],
        Dtype::STR,
        true,
        s_slice
    );

    m
});

fn type_err(message: String) -> RemesPathError {
    RemesPathError::Type { message }
}

fn as_f64(name: &str, value: &Json) -> Result<f64, RemesPathError> {
    match value {
        Json::Int(i) => Ok(*i as f64),
        Json::Float(x) => Ok(*x),
        _ => Err(type_err(format!(
            "function '{name}' expected a number, got {}",
            value.type_name()
        ))),
    }
}

/// Ordering of two comparable scalars; numbers compare across int/float.
pub(crate) fn cmp_scalars(a: &Json, b: &Json) -> Result<Ordering, RemesPathError> {
    match (a, b) {
        (Json::Str(x), Json::Str(y)) => Ok(x.cmp(y)),
        (Json::Bool(x), Json::Bool(y)) => Ok(x.cmp(y)),
        (Json::Int(_) | Json::Float(_), Json::Int(_) | Json::Float(_)) => {
            let x = as_f64("compare", a)?;
            let y = as_f64("compare", b)?;
            Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
        }
        _ => Err(type_err(format!(
            "cannot compare {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Equality with int/float coercion on scalars and structural recursion on
/// containers. Used by membership tests, where `1` should match `1.0`.
fn loose_equals(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Int(_) | Json::Float(_), Json::Int(_) | Json::Float(_)) => {
            let x = match a {
                Json::Int(i) => *i as f64,
                Json::Float(x) => *x,
                _ => return false,
            };
            let y = match b {
                Json::Int(i) => *i as f64,
                Json::Float(x) => *x,
                _ => return false,
            };
            x == y
        }
        (Json::Array(x), Json::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(u, v)| loose_equals(u, v))
        }
        (Json::Object(x), Json::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, u)| y.get(k).map(|v| loose_equals(u, v)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn sort_values(values: &mut [Json], reverse: bool) -> Result<(), RemesPathError> {
    let mut failure = None;
    values.sort_by(|a, b| match cmp_scalars(a, b) {
        Ok(ordering) => {
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        }
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn reverse_flag(arg: &Json) -> bool {
    matches!(arg, Json::Bool(true))
}

fn expect_array<'a>(name: &str, value: &'a Json) -> Result<&'a Vec<Json>, RemesPathError> {
    match value {
        Json::Array(a) => Ok(a),
        _ => Err(type_err(format!(
            "function '{name}' expected an array, got {}",
            value.type_name()
        ))),
    }
}

fn expect_str<'a>(name: &str, value: &'a Json) -> Result<&'a str, RemesPathError> {
    match value {
        Json::Str(s) => Ok(s),
        _ => Err(type_err(format!(
            "function '{name}' expected a string, got {}",
            value.type_name()
        ))),
    }
}

fn len(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Array(a) => Ok(Json::Int(a.len() as i64)),
        Json::Object(o) => Ok(Json::Int(o.len() as i64)),
        other => Err(type_err(format!(
            "function 'len' expected an iterable, got {}",
            other.type_name()
        ))),
    }
}

fn sum(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let arr = expect_array("sum", &args[0])?;
    let mut total = 0.0;
    for value in arr {
        total += as_f64("sum", value)?;
    }
    Ok(Json::Float(total))
}

fn mean(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let arr = expect_array("mean", &args[0])?;
    let mut total = 0.0;
    for value in arr {
        total += as_f64("mean", value)?;
    }
    Ok(Json::Float(total / arr.len() as f64))
}

fn fold_extreme(name: &str, args: &mut [Json], keep_left: fn(f64, f64) -> bool) -> Result<Json, RemesPathError> {
    let arr = expect_array(name, &args[0])?;
    let mut best: Option<f64> = None;
    for value in arr {
        let x = as_f64(name, value)?;
        best = Some(match best {
            Some(b) if keep_left(b, x) => b,
            _ => x,
        });
    }
    best.map(Json::Float)
        .ok_or_else(|| type_err(format!("function '{name}' of an empty array")))
}

fn min_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    fold_extreme("min", args, |b, x| b <= x)
}

fn max_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    fold_extreme("max", args, |b, x| b >= x)
}

fn range(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let first = match &args[0] {
        Json::Int(i) => *i,
        other => {
            return Err(type_err(format!(
                "function 'range' expected an int, got {}",
                other.type_name()
            )))
        }
    };
    let (start, stop, step) = match (&args[1], &args[2]) {
        (Json::Null, Json::Null) => (0, first, 1),
        (Json::Int(stop), Json::Null) => (first, *stop, 1),
        (Json::Int(stop), Json::Int(step)) => (first, *stop, *step),
        _ => {
            return Err(type_err(
                "function 'range' arguments after the first must be ints".to_owned(),
            ))
        }
    };
    if step == 0 {
        return Err(type_err("function 'range' step cannot be 0".to_owned()));
    }

    let mut out = vec![];
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Json::Int(i));
        i += step;
    }
    Ok(Json::Array(out))
}

fn keys(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Object(o) => Ok(Json::Array(
            o.keys().map(|k| Json::Str(k.clone())).collect(),
        )),
        other => Err(type_err(format!(
            "function 'keys' expected an object, got {}",
            other.type_name()
        ))),
    }
}

fn values(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Object(o) => Ok(Json::Array(o.values().cloned().collect())),
        other => Err(type_err(format!(
            "function 'values' expected an object, got {}",
            other.type_name()
        ))),
    }
}

fn items(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Object(o) => Ok(Json::Array(
            o.iter()
                .map(|(k, v)| Json::Array(vec![Json::Str(k.clone()), v.clone()]))
                .collect(),
        )),
        other => Err(type_err(format!(
            "function 'items' expected an object, got {}",
            other.type_name()
        ))),
    }
}

fn unique(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let arr = expect_array("unique", &args[0])?;
    let mut out: Vec<Json> = vec![];
    for value in arr {
        if !out.iter().any(|seen| loose_equals(seen, value)) {
            out.push(value.clone());
        }
    }
    if reverse_flag(&args[1]) {
        // second arg true means "return sorted"
        sort_values(&mut out, false)?;
    }
    Ok(Json::Array(out))
}

fn sorted(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let mut arr = expect_array("sorted", &args[0])?.clone();
    sort_values(&mut arr, reverse_flag(&args[1]))?;
    Ok(Json::Array(arr))
}

fn sort(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let reverse = reverse_flag(&args[1]);
    let owned = mem::replace(&mut args[0], Json::Null);
    let Json::Array(mut arr) = owned else {
        return Err(type_err(format!(
            "function 'sort' expected an array, got {}",
            owned.type_name()
        )));
    };
    sort_values(&mut arr, reverse)?;
    Ok(Json::Array(arr))
}

fn sort_key<'a>(name: &str, row: &'a Json, key: &Json) -> Result<&'a Json, RemesPathError> {
    match (row, key) {
        (Json::Object(o), Json::Str(k)) => o.get(k).ok_or_else(|| {
            type_err(format!("function '{name}': key '{k}' missing from object"))
        }),
        (Json::Array(a), Json::Int(i)) => {
            let idx = if *i < 0 { *i + a.len() as i64 } else { *i };
            if idx < 0 || idx >= a.len() as i64 {
                return Err(type_err(format!(
                    "function '{name}': index {i} out of bounds for array of length {}",
                    a.len()
                )));
            }
            Ok(&a[idx as usize])
        }
        _ => Err(type_err(format!(
            "function '{name}': rows must be objects keyed by a string or arrays keyed by an int"
        ))),
    }
}

fn sort_by(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let reverse = reverse_flag(&args[2]);
    let key = args[1].clone();
    let mut rows = expect_array("sort_by", &args[0])?.clone();

    let mut failure = None;
    rows.sort_by(|a, b| {
        let ordering = match (sort_key("sort_by", a, &key), sort_key("sort_by", b, &key)) {
            (Ok(x), Ok(y)) => cmp_scalars(x, y),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        match ordering {
            Ok(o) => {
                if reverse {
                    o.reverse()
                } else {
                    o
                }
            }
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(Json::Array(rows)),
    }
}

fn fold_extreme_by(
    name: &str,
    args: &mut [Json],
    keep_left: fn(Ordering) -> bool,
) -> Result<Json, RemesPathError> {
    let rows = expect_array(name, &args[0])?;
    let key = &args[1];
    let mut best: Option<&Json> = None;
    for row in rows {
        best = Some(match best {
            None => row,
            Some(b) => {
                let ordering = cmp_scalars(sort_key(name, b, key)?, sort_key(name, row, key)?)?;
                if keep_left(ordering) {
                    b
                } else {
                    row
                }
            }
        });
    }
    best.cloned()
        .ok_or_else(|| type_err(format!("function '{name}' of an empty array")))
}

fn max_by(args: &mut [Json]) -> Result<Json, RemesPathError> {
    fold_extreme_by("max_by", args, |o| o.is_ge())
}

fn min_by(args: &mut [Json]) -> Result<Json, RemesPathError> {
    fold_extreme_by("min_by", args, |o| o.is_le())
}

fn flatten(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let depth = match &args[1] {
        Json::Null => 1,
        Json::Int(i) => (*i).max(0),
        other => {
            return Err(type_err(format!(
                "function 'flatten' depth must be an int, got {}",
                other.type_name()
            )))
        }
    };
    let mut arr = expect_array("flatten", &args[0])?.clone();
    for _ in 0..depth {
        let mut next = Vec::with_capacity(arr.len());
        for value in arr {
            match value {
                Json::Array(inner) => next.extend(inner),
                other => next.push(other),
            }
        }
        arr = next;
    }
    Ok(Json::Array(arr))
}

fn index_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let arr = expect_array("index", &args[0])?;
    let target = &args[1];
    let position = if reverse_flag(&args[2]) {
        arr.iter().rposition(|v| loose_equals(v, target))
    } else {
        arr.iter().position(|v| loose_equals(v, target))
    };
    position.map(|i| Json::Int(i as i64)).ok_or_else(|| {
        type_err(format!("function 'index': {} not found in array", target))
    })
}

fn in_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[1] {
        Json::Array(a) => Ok(Json::Bool(a.iter().any(|v| loose_equals(v, &args[0])))),
        Json::Object(o) => {
            let key = expect_str("in", &args[0])?;
            Ok(Json::Bool(o.contains_key(key)))
        }
        other => Err(type_err(format!(
            "function 'in' expected an iterable, got {}",
            other.type_name()
        ))),
    }
}

fn concat(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Array(_) => {
            let mut out = vec![];
            for arg in args.iter() {
                out.extend(expect_array("concat", arg)?.iter().cloned());
            }
            Ok(Json::Array(out))
        }
        Json::Object(_) => {
            let mut out = IndexMap::new();
            for arg in args.iter() {
                match arg {
                    Json::Object(o) => {
                        for (k, v) in o {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                    other => {
                        return Err(type_err(format!(
                            "function 'concat' cannot mix objects with {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Json::Object(out))
        }
        other => Err(type_err(format!(
            "function 'concat' expected arrays or objects, got {}",
            other.type_name()
        ))),
    }
}

fn dict(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let pairs = expect_array("dict", &args[0])?;
    let mut out = IndexMap::with_capacity(pairs.len());
    for pair in pairs {
        let row = expect_array("dict", pair)?;
        let [key, value] = row.as_slice() else {
            return Err(type_err(
                "function 'dict' expected an array of [key, value] pairs".to_owned(),
            ));
        };
        out.insert(expect_str("dict", key)?.to_owned(), value.clone());
    }
    Ok(Json::Object(out))
}

fn zip(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let arrays = args
        .iter()
        .map(|arg| expect_array("zip", arg))
        .collect::<Result<Vec<_>, _>>()?;
    let len = arrays[0].len();
    if arrays.iter().any(|a| a.len() != len) {
        return Err(RemesPathError::VectorizedArithmetic {
            message: "function 'zip' requires arrays of equal length".to_owned(),
        });
    }
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(Json::Array(arrays.iter().map(|a| a[i].clone()).collect()));
    }
    Ok(Json::Array(out))
}

fn uminus(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Int(i) => Ok(Json::Int(i.wrapping_neg())),
        Json::Float(x) => Ok(Json::Float(-x)),
        other => Err(type_err(format!(
            "unary '-' is not defined on {}",
            other.type_name()
        ))),
    }
}

fn abs(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Int(i) => Ok(Json::Int(i.wrapping_abs())),
        Json::Float(x) => Ok(Json::Float(x.abs())),
        other => Err(type_err(format!(
            "function 'abs' expected a number, got {}",
            other.type_name()
        ))),
    }
}

fn round(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match (&args[0], &args[1]) {
        (Json::Int(i), _) => Ok(Json::Int(*i)),
        (Json::Float(x), Json::Null) => Ok(Json::Int(x.round() as i64)),
        (Json::Float(x), Json::Int(digits)) => {
            let scale = 10f64.powi(*digits as i32);
            Ok(Json::Float((x * scale).round() / scale))
        }
        _ => Err(type_err(
            "function 'round' expected a number and an optional int".to_owned(),
        )),
    }
}

fn log(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let x = as_f64("log", &args[0])?;
    match &args[1] {
        Json::Null => Ok(Json::Float(x.ln())),
        base => Ok(Json::Float(x.log(as_f64("log", base)?))),
    }
}

fn log2(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Float(as_f64("log2", &args[0])?.log2()))
}

fn str_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Str(s) => Ok(Json::Str(s.clone())),
        other => Ok(Json::Str(other.to_string())),
    }
}

fn int_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Bool(b) => Ok(Json::Int(*b as i64)),
        Json::Int(i) => Ok(Json::Int(*i)),
        Json::Float(x) => Ok(Json::Int(x.round() as i64)),
        Json::Str(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Json::Int(i));
            }
            trimmed
                .parse::<f64>()
                .map(|x| Json::Int(x.round() as i64))
                .map_err(|_| type_err(format!("function 'int' cannot parse '{s}'")))
        }
        other => Err(type_err(format!(
            "function 'int' is not defined on {}",
            other.type_name()
        ))),
    }
}

fn float_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Bool(b) => Ok(Json::Float(*b as i64 as f64)),
        Json::Int(i) => Ok(Json::Float(*i as f64)),
        Json::Float(x) => Ok(Json::Float(*x)),
        Json::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Json::Float)
            .map_err(|_| type_err(format!("function 'float' cannot parse '{s}'"))),
        other => Err(type_err(format!(
            "function 'float' is not defined on {}",
            other.type_name()
        ))),
    }
}

fn not_fn(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Bool(b) => Ok(Json::Bool(!b)),
        other => Err(type_err(format!(
            "function 'not' expected a bool, got {}",
            other.type_name()
        ))),
    }
}

fn isnull(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Bool(matches!(args[0], Json::Null)))
}

fn isnum(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Bool(matches!(args[0], Json::Int(_) | Json::Float(_))))
}

fn is_expr(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Bool(args[0].is_iterable()))
}

fn ifelse(args: &mut [Json]) -> Result<Json, RemesPathError> {
    match &args[0] {
        Json::Bool(true) => Ok(args[1].clone()),
        Json::Bool(false) => Ok(args[2].clone()),
        other => Err(type_err(format!(
            "function 'ifelse' condition must be a bool, got {}",
            other.type_name()
        ))),
    }
}

fn s_len(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Int(expect_str("s_len", &args[0])?.chars().count() as i64))
}

fn s_mul(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let s = expect_str("s_mul", &args[0])?;
    let n = match &args[1] {
        Json::Int(i) => (*i).max(0) as usize,
        other => {
            return Err(type_err(format!(
                "function 's_mul' expected an int, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Json::Str(s.repeat(n)))
}

fn s_count(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let s = expect_str("s_count", &args[0])?;
    let count = match &args[1] {
        Json::Regex(re) => re.regex().find_iter(s).count(),
        Json::Str(pattern) if pattern.is_empty() => 0,
        Json::Str(pattern) => s.matches(pattern.as_str()).count(),
        other => {
            return Err(type_err(format!(
                "function 's_count' expected a string or regex, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Json::Int(count as i64))
}

fn s_find(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let s = expect_str("s_find", &args[0])?;
    match &args[1] {
        Json::Regex(re) => Ok(Json::Array(
            re.regex()
                .find_iter(s)
                .map(|m| Json::Str(m.as_str().to_owned()))
                .collect(),
        )),
        other => Err(type_err(format!(
            "function 's_find' expected a regex, got {}",
            other.type_name()
        ))),
    }
}

fn s_split(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let s = expect_str("s_split", &args[0])?;
    let parts: Vec<Json> = match &args[1] {
        Json::Null => s.split_whitespace().map(|p| Json::Str(p.to_owned())).collect(),
        Json::Str(sep) if sep.is_empty() => {
            return Err(type_err(
                "function 's_split' separator cannot be empty".to_owned(),
            ))
        }
        Json::Str(sep) => s
            .split(sep.as_str())
            .map(|p| Json::Str(p.to_owned()))
            .collect(),
        Json::Regex(re) => re
            .regex()
            .split(s)
            .map(|p| Json::Str(p.to_owned()))
            .collect(),
        other => {
            return Err(type_err(format!(
                "function 's_split' expected a string or regex, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Json::Array(parts))
}

fn s_sub(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let s = expect_str("s_sub", &args[0])?;
    let replacement = expect_str("s_sub", &args[2])?;
    match &args[1] {
        Json::Regex(re) => Ok(Json::Str(re.regex().replace_all(s, replacement).into_owned())),
        Json::Str(pattern) => Ok(Json::Str(s.replace(pattern.as_str(), replacement))),
        other => Err(type_err(format!(
            "function 's_sub' expected a string or regex, got {}",
            other.type_name()
        ))),
    }
}

fn s_upper(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Str(expect_str("s_upper", &args[0])?.to_uppercase()))
}

fn s_lower(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Str(expect_str("s_lower", &args[0])?.to_lowercase()))
}

fn s_strip(args: &mut [Json]) -> Result<Json, RemesPathError> {
    Ok(Json::Str(expect_str("s_strip", &args[0])?.trim().to_owned()))
}

fn s_slice(args: &mut [Json]) -> Result<Json, RemesPathError> {
    let chars = expect_str("s_slice", &args[0])?.chars().collect::<Vec<_>>();
    match &args[1] {
        Json::Int(i) => {
            let idx = if *i < 0 { *i + chars.len() as i64 } else { *i };
            if idx < 0 || idx >= chars.len() as i64 {
                return Err(type_err(format!(
                    "function 's_slice': index {i} out of bounds for string of length {}",
                    chars.len()
                )));
            }
            Ok(Json::Str(chars[idx as usize].to_string()))
        }
        Json::Slice(sl) => Ok(Json::Str(
            sl.indices(chars.len()).into_iter().map(|i| chars[i]).collect(),
        )),
        other => Err(type_err(format!(
            "function 's_slice' expected an int or slice, got {}",
            other.type_name()
        ))),
    }
}
