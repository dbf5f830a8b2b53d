//! The indexer engine.
//!
//! Each parsed indexer becomes an [`Indexer`] whose job is to produce a lazy
//! sequence of (key, value) pairs from the value it is applied to. A chain
//! of indexers is applied left to right by [`apply_indexers`]: singleton
//! indexers unwrap their sole result, projections materialize immediately
//! and the chain continues from the projected value, and empty subresults
//! are elided from enclosing containers.

use indexmap::IndexMap;

use crate::error::RemesPathError;
use crate::json::{Dtype, Json};

/// The key half of a yielded (key, value) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Key<'a> {
    Index(usize),
    Name(&'a str),
}

/// A compiled projection: a fixed ordered sequence of sub-expressions, each
/// applied to the value being indexed.
#[derive(Debug, Clone)]
pub enum Projection {
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

impl Projection {
    pub fn out_type(&self) -> Dtype {
        match self {
            Projection::Array(_) => Dtype::ARR,
            Projection::Object(_) => Dtype::OBJ,
        }
    }

    fn materialize(&self, input: &Json) -> Result<Json, RemesPathError> {
        match self {
            Projection::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(resolve_child(item, input)?);
                }
                Ok(Json::Array(out))
            }
            Projection::Object(pairs) => {
                let mut out = IndexMap::with_capacity(pairs.len());
                for (key, item) in pairs {
                    out.insert(key.clone(), resolve_child(item, input)?);
                }
                Ok(Json::Object(out))
            }
        }
    }
}

fn resolve_child(child: &Json, input: &Json) -> Result<Json, RemesPathError> {
    match child {
        Json::CurJson(cur) => cur.apply(input),
        other => Ok(other.clone()),
    }
}

#[derive(Debug, Clone)]
pub enum IndexerKind {
    /// String and regex members selecting object keys.
    Varnames(Vec<Json>),
    /// Int and slice members selecting array indices.
    Slicers(Vec<Json>),
    /// All keys of an object or all indices of an array.
    Star,
    /// A boolean filter: a constant bool or a late-bound mask expression.
    Filter(Json),
    Projection(Projection),
}

/// One compiled indexer of a chain.
#[derive(Debug, Clone)]
pub struct Indexer {
    pub kind: IndexerKind,
    pub is_recursive: bool,
    /// A singleton indexer statically selects exactly one element, so its
    /// result is unwrapped from the container.
    pub is_singleton: bool,
}

impl Indexer {
    pub fn varnames(members: Vec<Json>, is_recursive: bool) -> Self {
        let is_singleton =
            !is_recursive && members.len() == 1 && matches!(members[0], Json::Str(_));
        Indexer {
            kind: IndexerKind::Varnames(members),
            is_recursive,
            is_singleton,
        }
    }

    pub fn slicers(members: Vec<Json>) -> Self {
        let is_singleton = members.len() == 1 && matches!(members[0], Json::Int(_));
        Indexer {
            kind: IndexerKind::Slicers(members),
            is_recursive: false,
            is_singleton,
        }
    }

    pub fn star() -> Self {
        Indexer {
            kind: IndexerKind::Star,
            is_recursive: false,
            is_singleton: false,
        }
    }

    pub fn filter(filter: Json) -> Self {
        Indexer {
            kind: IndexerKind::Filter(filter),
            is_recursive: false,
            is_singleton: false,
        }
    }

    pub fn projection(projection: Projection) -> Self {
        Indexer {
            kind: IndexerKind::Projection(projection),
            is_recursive: false,
            is_singleton: false,
        }
    }

    pub fn is_projection(&self) -> bool {
        matches!(self.kind, IndexerKind::Projection(_))
    }

    /// Whether this indexer's results collect into an object rather than an
    /// array when applied to `json`.
    fn emits_object(&self, json: &Json) -> bool {
        match &self.kind {
            IndexerKind::Varnames(_) => true,
            IndexerKind::Slicers(_) => false,
            IndexerKind::Star | IndexerKind::Filter(_) => matches!(json, Json::Object(_)),
            IndexerKind::Projection(p) => matches!(p, Projection::Object(_)),
        }
    }
}

type Pairs<'a> = Box<dyn Iterator<Item = (Key<'a>, &'a Json)> + 'a>;

fn varname_pairs<'a>(members: &'a [Json], json: &'a Json) -> Result<Pairs<'a>, RemesPathError> {
    let Json::Object(obj) = json else {
        return Err(RemesPathError::Type {
            message: format!("cannot index {} with a key", json.type_name()),
        });
    };
    Ok(Box::new(members.iter().flat_map(move |member| -> Pairs<'a> {
        match member {
            Json::Str(name) => Box::new(
                obj.get_key_value(name.as_str())
                    .map(|(k, v)| (Key::Name(k.as_str()), v))
                    .into_iter(),
            ),
            Json::Regex(re) => {
                let re = re.regex();
                Box::new(
                    obj.iter()
                        .filter(move |(k, _)| re.is_match(k.as_str()))
                        .map(|(k, v)| (Key::Name(k.as_str()), v)),
                )
            }
            _ => Box::new(std::iter::empty()),
        }
    })))
}

fn slicer_pairs<'a>(members: &'a [Json], json: &'a Json) -> Result<Pairs<'a>, RemesPathError> {
    let Json::Array(arr) = json else {
        return Err(RemesPathError::Type {
            message: format!("cannot index {} with ints or slices", json.type_name()),
        });
    };
    Ok(Box::new(members.iter().flat_map(move |member| -> Pairs<'a> {
        match member {
            Json::Int(i) => {
                let idx = if *i < 0 { *i + arr.len() as i64 } else { *i };
                if idx >= 0 && idx < arr.len() as i64 {
                    let idx = idx as usize;
                    Box::new(std::iter::once((Key::Index(idx), &arr[idx])))
                } else {
                    Box::new(std::iter::empty())
                }
            }
            Json::Slice(sl) => Box::new(
                sl.indices(arr.len())
                    .into_iter()
                    .map(move |i| (Key::Index(i), &arr[i])),
            ),
            _ => Box::new(std::iter::empty()),
        }
    })))
}

fn star_pairs(json: &Json) -> Result<Pairs<'_>, RemesPathError> {
    match json {
        Json::Object(o) => Ok(Box::new(
            o.iter().map(|(k, v)| (Key::Name(k.as_str()), v)),
        )),
        Json::Array(a) => Ok(Box::new(
            a.iter().enumerate().map(|(i, v)| (Key::Index(i), v)),
        )),
        other => Err(RemesPathError::Type {
            message: format!("cannot apply the star indexer to {}", other.type_name()),
        }),
    }
}

fn filter_pairs<'a>(filter: &Json, json: &'a Json) -> Result<Pairs<'a>, RemesPathError> {
    if !json.is_iterable() {
        return Err(RemesPathError::Type {
            message: format!("cannot apply a boolean index to {}", json.type_name()),
        });
    }
    let mask = match filter {
        Json::CurJson(cur) => cur.apply(json)?,
        other => other.clone(),
    };
    match (&mask, json) {
        (Json::Bool(true), _) => star_pairs(json),
        (Json::Bool(false), _) => Ok(Box::new(std::iter::empty())),
        (Json::Array(mask), Json::Array(arr)) => {
            if mask.len() != arr.len() {
                return Err(RemesPathError::VectorizedArithmetic {
                    message: format!(
                        "boolean index of length {} cannot select from an array of length {}",
                        mask.len(),
                        arr.len()
                    ),
                });
            }
            let mut selected = vec![];
            for (i, flag) in mask.iter().enumerate() {
                match flag {
                    Json::Bool(true) => selected.push(i),
                    Json::Bool(false) => {}
                    other => {
                        return Err(RemesPathError::VectorizedArithmetic {
                            message: format!(
                                "boolean index must contain only bools, got {}",
                                other.type_name()
                            ),
                        })
                    }
                }
            }
            Ok(Box::new(
                selected.into_iter().map(move |i| (Key::Index(i), &arr[i])),
            ))
        }
        (Json::Object(mask), Json::Object(obj)) => {
            if mask.len() != obj.len() {
                return Err(RemesPathError::VectorizedArithmetic {
                    message: "boolean index and object have different key sets".to_owned(),
                });
            }
            let mut selected = vec![];
            for (key, value) in obj {
                match mask.get(key) {
                    Some(Json::Bool(true)) => selected.push((Key::Name(key.as_str()), value)),
                    Some(Json::Bool(false)) => {}
                    Some(other) => {
                        return Err(RemesPathError::VectorizedArithmetic {
                            message: format!(
                                "boolean index must contain only bools, got {}",
                                other.type_name()
                            ),
                        })
                    }
                    None => {
                        return Err(RemesPathError::VectorizedArithmetic {
                            message: "boolean index and object have different key sets".to_owned(),
                        })
                    }
                }
            }
            Ok(Box::new(selected.into_iter()))
        }
        _ => Err(RemesPathError::VectorizedArithmetic {
            message: format!(
                "boolean index must be a bool or a same-shape iterable of bools, got {}",
                mask.type_name()
            ),
        }),
    }
}

enum Frame<'a> {
    Object(indexmap::map::Iter<'a, String, Json>),
    Array(std::slice::Iter<'a, Json>),
}

impl<'a> Frame<'a> {
    fn of(json: &'a Json) -> Option<Frame<'a>> {
        match json {
            Json::Object(o) => Some(Frame::Object(o.iter())),
            Json::Array(a) => Some(Frame::Array(a.iter())),
            _ => None,
        }
    }
}

/// Pre-order descent yielding every value whose key matches one of the
/// configured names or regexes. Keys that match are yielded without further
/// descent; keys that do not match are recursed into, and arrays are
/// traversed transparently. The tree is owned by value, so one rooted
/// subtree can never be reached twice.
struct RecursiveMatches<'a> {
    members: &'a [Json],
    stack: Vec<Frame<'a>>,
}

impl<'a> RecursiveMatches<'a> {
    fn new(members: &'a [Json], json: &'a Json) -> Self {
        RecursiveMatches {
            members,
            stack: Frame::of(json).into_iter().collect(),
        }
    }
}

fn key_matches(members: &[Json], key: &str) -> bool {
    members.iter().any(|member| match member {
        Json::Str(name) => name == key,
        Json::Regex(re) => re.regex().is_match(key),
        _ => false,
    })
}

/// One step of the descent: the next (key, value) entry of the topmost
/// frame, or the end of that frame.
enum Step<'a> {
    Done,
    Entry(Option<&'a str>, &'a Json),
}

impl<'a> Iterator for RecursiveMatches<'a> {
    type Item = &'a Json;

    fn next(&mut self) -> Option<&'a Json> {
        loop {
            let frame = self.stack.last_mut()?;
            let step = match frame {
                Frame::Object(entries) => match entries.next() {
                    Some((key, value)) => Step::Entry(Some(key.as_str()), value),
                    None => Step::Done,
                },
                Frame::Array(values) => match values.next() {
                    Some(value) => Step::Entry(None, value),
                    None => Step::Done,
                },
            };
            match step {
                Step::Done => {
                    self.stack.pop();
                }
                Step::Entry(key, value) => {
                    if let Some(key) = key {
                        if key_matches(self.members, key) {
                            return Some(value);
                        }
                    }
                    if let Some(child_frame) = Frame::of(value) {
                        self.stack.push(child_frame);
                    }
                }
            }
        }
    }
}

/// Apply an indexer chain left to right.
pub fn apply_indexers(json: &Json, indexers: &[Indexer]) -> Result<Json, RemesPathError> {
    let Some((first, rest)) = indexers.split_first() else {
        return Ok(json.clone());
    };

    match &first.kind {
        IndexerKind::Projection(projection) => {
            let projected = projection.materialize(json)?;
            apply_indexers(&projected, rest)
        }
        IndexerKind::Varnames(members) if first.is_recursive => {
            let mut out = vec![];
            for value in RecursiveMatches::new(members, json) {
                if rest.is_empty() {
                    out.push(value.clone());
                } else {
                    let sub = apply_indexers(value, rest)?;
                    if !sub.is_empty_iterable() {
                        out.push(sub);
                    }
                }
            }
            Ok(Json::Array(out))
        }
        kind => {
            let mut pairs = match kind {
                IndexerKind::Varnames(members) => varname_pairs(members, json)?,
                IndexerKind::Slicers(members) => slicer_pairs(members, json)?,
                IndexerKind::Star => star_pairs(json)?,
                IndexerKind::Filter(filter) => filter_pairs(filter, json)?,
                IndexerKind::Projection(_) => unreachable!("projections are handled above"),
            };

            if first.is_singleton {
                return match pairs.next() {
                    None => Ok(empty_container(first, json)),
                    Some((_, value)) => {
                        if rest.is_empty() {
                            Ok(value.clone())
                        } else {
                            apply_indexers(value, rest)
                        }
                    }
                };
            }

            if first.emits_object(json) {
                let mut out = IndexMap::new();
                for (key, value) in pairs {
                    let key = match key {
                        Key::Name(name) => name.to_owned(),
                        Key::Index(i) => i.to_string(),
                    };
                    match subresult(value, rest)? {
                        Some(sub) => {
                            out.insert(key, sub);
                        }
                        None => {}
                    }
                }
                Ok(Json::Object(out))
            } else {
                let mut out = vec![];
                for (_, value) in pairs {
                    if let Some(sub) = subresult(value, rest)? {
                        out.push(sub);
                    }
                }
                Ok(Json::Array(out))
            }
        }
    }
}

/// The rest of the chain applied to one selected value; `None` when the
/// subresult is an empty iterable that should be elided.
fn subresult(value: &Json, rest: &[Indexer]) -> Result<Option<Json>, RemesPathError> {
    if rest.is_empty() {
        return Ok(Some(value.clone()));
    }
    let sub = apply_indexers(value, rest)?;
    if sub.is_empty_iterable() {
        Ok(None)
    } else {
        Ok(Some(sub))
    }
}

fn empty_container(indexer: &Indexer, json: &Json) -> Json {
    if indexer.emits_object(json) {
        Json::Object(IndexMap::new())
    } else {
        Json::Array(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::{CurJson, JsonRegex, JsonSlice};
    use regex::Regex;

    fn doc() -> Json {
        Json::parse(r#"{"a": {"b": 1, "c": [2, 3]}, "d": [{"b": 4}], "e": 5}"#).unwrap()
    }

    fn ints(values: &[i64]) -> Json {
        Json::Array(values.iter().map(|i| Json::Int(*i)).collect())
    }

    #[test]
    fn test_singleton_varname_unwraps() {
        let idx = Indexer::varnames(vec![Json::Str("e".into())], false);
        assert!(idx.is_singleton);
        assert_eq!(apply_indexers(&doc(), &[idx]).unwrap(), Json::Int(5));
    }

    #[test]
    fn test_missing_key_yields_empty_object() {
        let idx = Indexer::varnames(vec![Json::Str("nope".into())], false);
        assert_eq!(
            apply_indexers(&doc(), &[idx]).unwrap(),
            Json::Object(indexmap::IndexMap::new())
        );
    }

    #[test]
    fn test_multi_varname_collects_object() {
        let idx = Indexer::varnames(
            vec![Json::Str("e".into()), Json::Str("a".into())],
            false,
        );
        assert!(!idx.is_singleton);
        let Json::Object(o) = apply_indexers(&doc(), &[idx]).unwrap() else {
            panic!("expected an object");
        };
        let keys = o.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["e", "a"]);
    }

    #[test]
    fn test_singleton_index_and_slice() {
        let arr = ints(&[10, 20, 30]);
        let one = Indexer::slicers(vec![Json::Int(-1)]);
        assert!(one.is_singleton);
        assert_eq!(apply_indexers(&arr, &[one]).unwrap(), Json::Int(30));

        let sl = Indexer::slicers(vec![Json::Slice(
            JsonSlice::new(None, None, Some(-1)).unwrap(),
        )]);
        assert!(!sl.is_singleton);
        assert_eq!(apply_indexers(&arr, &[sl]).unwrap(), ints(&[30, 20, 10]));

        let out_of_bounds = Indexer::slicers(vec![Json::Int(7)]);
        assert_eq!(
            apply_indexers(&arr, &[out_of_bounds]).unwrap(),
            Json::Array(vec![])
        );
    }

    #[test]
    fn test_key_indexer_on_array_is_a_type_error() {
        let idx = Indexer::varnames(vec![Json::Str("a".into())], false);
        let err = apply_indexers(&ints(&[1]), &[idx]).unwrap_err();
        assert!(matches!(err, RemesPathError::Type { .. }));
    }

    #[test]
    fn test_filter_mask() {
        let arr = ints(&[1, 2, 3]);
        let mask = Json::Array(vec![Json::Bool(false), Json::Bool(true), Json::Bool(true)]);
        assert_eq!(
            apply_indexers(&arr, &[Indexer::filter(mask)]).unwrap(),
            ints(&[2, 3])
        );

        let short_mask = Json::Array(vec![Json::Bool(true)]);
        let err = apply_indexers(&arr, &[Indexer::filter(short_mask)]).unwrap_err();
        assert!(matches!(err, RemesPathError::VectorizedArithmetic { .. }));

        let non_bool = Json::Array(vec![Json::Int(1), Json::Int(0), Json::Int(1)]);
        let err = apply_indexers(&arr, &[Indexer::filter(non_bool)]).unwrap_err();
        assert!(matches!(err, RemesPathError::VectorizedArithmetic { .. }));
    }

    #[test]
    fn test_filter_scalar_bool() {
        let arr = ints(&[1, 2]);
        assert_eq!(
            apply_indexers(&arr, &[Indexer::filter(Json::Bool(true))]).unwrap(),
            ints(&[1, 2])
        );
        assert_eq!(
            apply_indexers(&arr, &[Indexer::filter(Json::Bool(false))]).unwrap(),
            Json::Array(vec![])
        );
    }

    #[test]
    fn test_recursive_search_matches_and_order() {
        let members = vec![Json::Str("b".into())];
        let idx = Indexer::varnames(members, true);
        assert!(!idx.is_singleton);
        // "b" under "a" comes before "b" under "d"; the matched subtree is
        // yielded without descending into it
        assert_eq!(apply_indexers(&doc(), &[idx]).unwrap(), ints(&[1, 4]));
    }

    #[test]
    fn test_recursive_regex_search() {
        let re = Json::Regex(JsonRegex::new(Regex::new("^[bc]$").unwrap()));
        let idx = Indexer::varnames(vec![re], true);
        assert_eq!(
            apply_indexers(&doc(), &[idx]).unwrap(),
            Json::Array(vec![Json::Int(1), ints(&[2, 3]), Json::Int(4)])
        );
    }

    #[test]
    fn test_projection_materializes_and_chain_continues() {
        let proj = Indexer::projection(Projection::Object(vec![
            ("first".into(), Json::CurJson(CurJson::new(Dtype::UNKNOWN, |v| {
                apply_indexers(v, &[Indexer::varnames(vec![Json::Str("e".into())], false)])
            }))),
            ("label".into(), Json::Str("doc".into())),
        ]));
        let tail = Indexer::varnames(vec![Json::Str("first".into())], false);
        assert_eq!(apply_indexers(&doc(), &[proj, tail]).unwrap(), Json::Int(5));
    }

    #[test]
    fn test_empty_subresults_are_elided() {
        // select "b" under every value; "e" is a scalar-free path that
        // yields nothing and must not leave a hole
        let doc = Json::parse(r#"{"x": {"b": 1}, "y": {"c": 2}}"#).unwrap();
        let star = Indexer::star();
        let b = Indexer::varnames(vec![Json::Regex(JsonRegex::new(Regex::new("^b$").unwrap()))], false);
        let Json::Object(o) = apply_indexers(&doc, &[star, b]).unwrap() else {
            panic!("expected an object");
        };
        assert_eq!(o.len(), 1);
        assert_eq!(o["x"], Json::Object(IndexMap::from_iter([("b".to_owned(), Json::Int(1))])));
    }
}
