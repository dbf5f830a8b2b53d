//! The JSON value model of the query engine.
//!
//! Besides the six standard JSON kinds, the engine extends the value space
//! with three variants of its own: a compiled regex, a compiled slice, and
//! the late-bound current-input reference produced by the parser for any
//! expression that depends on the queried document.

mod dtype;

pub use dtype::Dtype;

use std::fmt::{self, Display, Write};
use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::RemesPathError;

/// A JSON value, plus the engine-only variants.
///
/// Arrays preserve index order and objects preserve insertion order; object
/// key uniqueness is enforced by the underlying map. The enum discriminant
/// is the value's type tag, so the tag can never go stale.
#[derive(Debug, Clone)]
pub enum Json {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Json>),
    Object(IndexMap<String, Json>),
    /// A compiled regex pattern, usable in key indexers and as a function
    /// argument.
    Regex(JsonRegex),
    /// A compiled slice; an indexer construct, not a queryable value.
    Slice(JsonSlice),
    /// A late-bound function of the current input.
    CurJson(CurJson),
}

impl Json {
    pub fn dtype(&self) -> Dtype {
        match self {
            Json::Null => Dtype::NULL,
            Json::Bool(_) => Dtype::BOOL,
            Json::Int(_) => Dtype::INT,
            Json::Float(_) => Dtype::FLOAT,
            Json::Str(_) => Dtype::STR,
            Json::Array(_) => Dtype::ARR,
            Json::Object(_) => Dtype::OBJ,
            Json::Regex(_) => Dtype::REGEX,
            Json::Slice(_) => Dtype::SLICE,
            Json::CurJson(cur) => cur.dtype(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Json::Null => "null",
            Json::Bool(_) => "bool",
            Json::Int(_) => "int",
            Json::Float(_) => "float",
            Json::Str(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
            Json::Regex(_) => "regex",
            Json::Slice(_) => "slice",
            Json::CurJson(_) => "function of input",
        }
    }

    pub fn is_iterable(&self) -> bool {
        matches!(self, Json::Array(_) | Json::Object(_))
    }

    /// True for an array or object with no members. Used by the indexer
    /// chain to elide empty subresults.
    pub fn is_empty_iterable(&self) -> bool {
        match self {
            Json::Array(a) => a.is_empty(),
            Json::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Parse a standard JSON document into a [`Json`] value. Object member
    /// order is preserved.
    pub fn parse(text: &str) -> Result<Json, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(Json::from(value))
    }
}

impl From<serde_json::Value> for Json {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Json::Null,
            serde_json::Value::Bool(b) => Json::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Json::Int(i)
                } else {
                    Json::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Json::Str(s),
            serde_json::Value::Array(a) => Json::Array(a.into_iter().map(Json::from).collect()),
            serde_json::Value::Object(o) => {
                let mut map = IndexMap::with_capacity(o.len());
                for (key, value) in o {
                    map.insert(key, Json::from(value));
                }
                Json::Object(map)
            }
        }
    }
}

/// Structural equality on concrete values. Ints and floats never compare
/// equal to each other, regexes compare by pattern text, and a late-bound
/// reference is never equal to anything.
impl PartialEq for Json {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Json::Null, Json::Null) => true,
            (Json::Bool(a), Json::Bool(b)) => a == b,
            (Json::Int(a), Json::Int(b)) => a == b,
            (Json::Float(a), Json::Float(b)) => a == b,
            (Json::Str(a), Json::Str(b)) => a == b,
            (Json::Array(a), Json::Array(b)) => a == b,
            (Json::Object(a), Json::Object(b)) => a == b,
            (Json::Regex(a), Json::Regex(b)) => a == b,
            (Json::Slice(a), Json::Slice(b)) => a == b,
            _ => false,
        }
    }
}

/// The canonical text form of a value; standard JSON for the standard
/// variants.
impl Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Json::Null => f.write_str("null"),
            Json::Bool(b) => write!(f, "{b}"),
            Json::Int(i) => write!(f, "{i}"),
            Json::Float(x) => {
                if x.is_nan() {
                    f.write_str("NaN")
                } else if x.is_infinite() {
                    f.write_str(if *x > 0.0 { "Infinity" } else { "-Infinity" })
                } else {
                    write!(f, "{x:?}")
                }
            }
            Json::Str(s) => write_json_string(f, s),
            Json::Array(a) => {
                f.write_char('[')?;
                for (i, value) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(value, f)?;
                }
                f.write_char(']')
            }
            Json::Object(o) => {
                f.write_char('{')?;
                for (i, (key, value)) in o.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_json_string(f, key)?;
                    f.write_str(": ")?;
                    Display::fmt(value, f)?;
                }
                f.write_char('}')
            }
            Json::Regex(re) => write_json_string(f, re.as_str()),
            Json::Slice(sl) => write!(f, "{sl}"),
            Json::CurJson(_) => f.write_str("@"),
        }
    }
}

fn write_json_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{8}' => f.write_str("\\b")?,
            '\u{c}' => f.write_str("\\f")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

impl Serialize for Json {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Json::Null => serializer.serialize_unit(),
            Json::Bool(b) => serializer.serialize_bool(*b),
            Json::Int(i) => serializer.serialize_i64(*i),
            Json::Float(x) => serializer.serialize_f64(*x),
            Json::Str(s) => serializer.serialize_str(s),
            Json::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for value in a {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Json::Object(o) => {
                let mut map = serializer.serialize_map(Some(o.len()))?;
                for (key, value) in o {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Json::Regex(re) => serializer.serialize_str(re.as_str()),
            Json::Slice(sl) => serializer.serialize_str(&sl.to_string()),
            Json::CurJson(_) => Err(serde::ser::Error::custom(
                "a query that depends on its input cannot be serialized",
            )),
        }
    }
}

/// A compiled regex. Equality compares the pattern text.
#[derive(Debug, Clone)]
pub struct JsonRegex(Regex);

impl JsonRegex {
    pub fn new(regex: Regex) -> Self {
        JsonRegex(regex)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl PartialEq for JsonRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// A compiled slice: up to three optional integers with Python semantics
/// (negative indices count from the end, out-of-range bounds clip, the
/// right bound is exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonSlice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl JsonSlice {
    pub fn new(
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    ) -> Result<Self, RemesPathError> {
        if step == Some(0) {
            return Err(RemesPathError::Type {
                message: "slice step cannot be 0".to_owned(),
            });
        }
        Ok(JsonSlice { start, stop, step })
    }

    /// The in-bounds indices this slice selects from a sequence of `len`
    /// elements, in selection order.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let step = self.step.unwrap_or(1);

        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };

        let start = match self.start {
            None => {
                if step < 0 {
                    upper
                } else {
                    lower
                }
            }
            Some(s) => clip(if s < 0 { s + len } else { s }, lower, upper),
        };
        let stop = match self.stop {
            None => {
                if step < 0 {
                    lower
                } else {
                    upper
                }
            }
            Some(s) => clip(if s < 0 { s + len } else { s }, lower, upper),
        };

        let mut out = vec![];
        let mut i = start;
        if step > 0 {
            while i < stop {
                out.push(i as usize);
                i += step;
            }
        } else {
            while i > stop {
                out.push(i as usize);
                i += step;
            }
        }
        out
    }
}

impl Display for JsonSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |v: Option<i64>| v.map(|i| i.to_string()).unwrap_or_default();
        write!(
            f,
            "{}:{}:{}",
            part(self.start),
            part(self.stop),
            part(self.step)
        )
    }
}

fn clip(value: i64, lower: i64, upper: i64) -> i64 {
    value.max(lower).min(upper)
}

type CurJsonFn = dyn Fn(&Json) -> Result<Json, RemesPathError>;

/// The current-input reference: a function of the queried document together
/// with the output type tag the analyzer inferred for it.
///
/// The declared tag is a superset of every concrete type the function can
/// produce; `Dtype::UNKNOWN` when nothing tighter is known. Cloning shares
/// the underlying function, so compiled queries are cheap to reuse.
#[derive(Clone)]
pub struct CurJson {
    dtype: Dtype,
    function: Rc<CurJsonFn>,
}

impl CurJson {
    pub fn new(
        dtype: Dtype,
        function: impl Fn(&Json) -> Result<Json, RemesPathError> + 'static,
    ) -> Self {
        CurJson {
            dtype,
            function: Rc::new(function),
        }
    }

    /// The reference to the input itself, written `@` in a query.
    pub fn identity() -> Self {
        CurJson::new(Dtype::UNKNOWN, |input| Ok(input.clone()))
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Evaluate against a concrete input.
    pub fn apply(&self, input: &Json) -> Result<Json, RemesPathError> {
        (self.function)(input)
    }
}

impl fmt::Debug for CurJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurJson")
            .field("dtype", &self.dtype)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> JsonSlice {
        JsonSlice::new(start, stop, step).unwrap()
    }

    #[test]
    fn test_slice_step_zero_rejected() {
        assert!(JsonSlice::new(None, None, Some(0)).is_err());
    }

    #[test]
    fn test_slice_indices_forward() {
        assert_eq!(slice(None, None, None).indices(4), vec![0, 1, 2, 3]);
        assert_eq!(slice(Some(1), Some(3), None).indices(4), vec![1, 2]);
        assert_eq!(slice(None, Some(3), Some(2)).indices(4), vec![0, 2]);
        assert_eq!(slice(Some(2), Some(2), None).indices(4), Vec::<usize>::new());
        assert_eq!(slice(Some(3), Some(1), None).indices(4), Vec::<usize>::new());
    }

    #[test]
    fn test_slice_indices_negative() {
        assert_eq!(slice(Some(-2), None, None).indices(4), vec![2, 3]);
        assert_eq!(slice(None, Some(-1), None).indices(4), vec![0, 1, 2]);
        assert_eq!(slice(None, None, Some(-1)).indices(4), vec![3, 2, 1, 0]);
        assert_eq!(slice(Some(-1), Some(0), Some(-2)).indices(5), vec![4, 2]);
    }

    #[test]
    fn test_slice_indices_clip() {
        assert_eq!(slice(Some(-10), Some(10), None).indices(3), vec![0, 1, 2]);
        assert_eq!(slice(Some(5), Some(10), None).indices(3), Vec::<usize>::new());
        assert_eq!(slice(Some(10), None, Some(-1)).indices(3), vec![2, 1, 0]);
        assert_eq!(
            slice(Some(-10), None, Some(-1)).indices(3),
            Vec::<usize>::new()
        );
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Json::Int(3), Json::Int(3));
        assert_ne!(Json::Int(3), Json::Float(3.0));
        assert_ne!(
            Json::CurJson(CurJson::identity()),
            Json::CurJson(CurJson::identity())
        );

        let a = Json::parse(r#"{"a": [1, 2.5], "b": null}"#).unwrap();
        let b = Json::parse(r#"{"a": [1, 2.5], "b": null}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_roundtrip() {
        let text = r#"{"a": [1, 2.5, "x\ny"], "b": {}, "c": [true, null]}"#;
        let value = Json::parse(text).unwrap();
        assert_eq!(Json::parse(&value.to_string()).unwrap(), value);
    }

    #[test]
    fn test_display_floats() {
        assert_eq!(Json::Float(-12.0).to_string(), "-12.0");
        assert_eq!(Json::Float(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn test_object_order_preserved() {
        let Json::Object(o) = Json::parse(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap() else {
            panic!("expected an object");
        };
        let keys = o.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
