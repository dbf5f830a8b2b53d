//! End-to-end tests for the query engine: every scenario is checked through
//! both `search` and `apply(compile(q))`.

use pretty_assertions::assert_eq;
use remespath::{apply, compile, search, Json, RemesParser, RemesPathError};

fn foo() -> Json {
    Json::parse(
        r#"{
            "foo": [[0, 1, 2], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0]],
            "bar": {"a": false, "b": ["a`g", "bah"]},
            "baz": "z",
            "quz": {},
            "jub": [],
            "guzo": [[[1]], [[2], [3]]],
            "7": [{"foo": 2}, 1],
            "_": {"0": 0}
        }"#,
    )
    .unwrap()
}

/// Check a query against the seed document through both entry points, and
/// check that the compiled query is repeatable.
fn check(query: &str, expected: &str) {
    let doc = foo();
    let expected = Json::parse(expected).unwrap();
    assert_eq!(search(query, &doc).unwrap(), expected, "search: {query}");

    let compiled = compile(query).unwrap();
    assert_eq!(apply(&compiled, &doc).unwrap(), expected, "apply: {query}");
    assert_eq!(
        apply(&compiled, &doc).unwrap(),
        expected,
        "second apply: {query}"
    );
}

#[test]
fn test_constant_arithmetic() {
    check("2 - 4 * 3.5", "-12.0");
}

#[test]
fn test_elementwise_addition() {
    check("@.foo[0] + @.foo[1]", "[3.0, 5.0, 7.0]");
}

#[test]
fn test_boolean_filter() {
    check("@.foo[1][@ > 3.5]", "[4.0, 5.0]");
}

#[test]
fn test_stepped_slice() {
    check("@.foo[:3:2]", "[[0, 1, 2], [6.0, 7.0, 8.0]]");
}

#[test]
fn test_recursive_regex_search() {
    check(r"@..g`\d`", r#"[[{"foo": 2}, 1], 0]"#);
}

#[test]
fn test_sort_by_then_slice() {
    check(
        "sort_by(@.foo, 0, true)[:2]",
        "[[6.0, 7.0, 8.0], [3.0, 4.0, 5.0]]",
    );
}

#[test]
fn test_object_projection() {
    check(
        "@.foo{f: @[0], b: @[1][:2]}",
        r#"{"f": [0, 1, 2], "b": [3.0, 4.0]}"#,
    );
}

#[test]
fn test_range() {
    check("range(2, 19, 5)", "[2, 7, 12, 17]");
}

#[test]
fn test_identity_round_trip() {
    for text in [
        "null",
        "true",
        "17",
        "-2.5",
        r#""a string""#,
        "[1, [2.5, null], {}]",
        r#"{"a": {"b": [1]}, "c": "x"}"#,
    ] {
        let value = Json::parse(text).unwrap();
        assert_eq!(search("@", &value).unwrap(), value);
    }
    assert_eq!(search("@", &foo()).unwrap(), foo());
}

#[test]
fn test_filter_idempotence() {
    let arr = Json::parse(r#"[1, "a", 2.5, true]"#).unwrap();
    assert_eq!(search("@[@ == @]", &arr).unwrap(), arr);

    let obj = Json::parse(r#"{"a": 1, "b": "x", "c": false}"#).unwrap();
    assert_eq!(search("@[@ == @]", &obj).unwrap(), obj);
}

#[test]
fn test_constant_queries_ignore_the_input() {
    let compiled = compile("range(3)").unwrap();
    assert!(!matches!(compiled, Json::CurJson(_)));
    let expected = Json::parse("[0, 1, 2]").unwrap();
    assert_eq!(search("range(3)", &foo()).unwrap(), expected);
    assert_eq!(search("range(3)", &Json::Null).unwrap(), expected);
}

#[test]
fn test_search_is_pure() {
    let doc = foo();
    let first = search("@.foo[0] * 2 + @.foo[1]", &doc).unwrap();
    let second = search("@.foo[0] * 2 + @.foo[1]", &doc).unwrap();
    assert_eq!(first, second);
    assert_eq!(doc, foo());
}

#[test]
fn test_singleton_indexers_unwrap() {
    check("@.baz", r#""z""#);
    check("@.foo[0]", "[0, 1, 2]");
    check("@.foo[0][2]", "2");
    check("@.bar.b[1]", r#""bah""#);
    // a one-string bracket list is unwrapped too, not a one-key object
    check("@[`baz`]", r#""z""#);
    check("@.foo[0][1:]", "[1, 2]");
}

#[test]
fn test_missing_key_yields_empty_object() {
    check("@.nothing", "{}");
    check("@.quz.also_nothing", "{}");
}

#[test]
fn test_slice_boundaries() {
    check("@.foo[0][10:]", "[]");
    check("@.foo[0][2:1]", "[]");
    check("@.foo[0][-2:]", "[1, 2]");
    check("@.foo[0][::-1]", "[2, 1, 0]");
    check("@.foo[0][-10:10]", "[0, 1, 2]");
    check("@.foo[0][-1]", "2");
}

#[test]
fn test_star_indexers() {
    check("@.bar.b[*]", r#"["a`g", "bah"]"#);
    check("@.bar[*]", r#"{"a": false, "b": ["a`g", "bah"]}"#);
    check("@.guzo.*", "[[[1]], [[2], [3]]]");
}

#[test]
fn test_multi_key_and_regex_indexers() {
    check("@[`baz`, `quz`]", r#"{"baz": "z", "quz": {}}"#);
    check(r"@[g`^b`]", r#"{"bar": {"a": false, "b": ["a`g", "bah"]}, "baz": "z"}"#);
    check(r"@.bar[g`^a$`]", r#"{"a": false}"#);
    check("@.foo[0, 2]", "[[0, 1, 2], [6.0, 7.0, 8.0]]");
}

#[test]
fn test_vectorized_function_on_empty_iterables() {
    check("str(@.jub)", "[]");
    check("str(@.quz)", "{}");
}

#[test]
fn test_vectorized_functions() {
    check("s_upper(@.bar.b)", r#"["A`G", "BAH"]"#);
    check("abs(@.foo[0] - 1)", "[1, 0, 1]");
    check("str(@.foo[1])", r#"["3.0", "4.0", "5.0"]"#);
    check("int(@.foo[1])", "[3, 4, 5]");
}

#[test]
fn test_reducing_functions() {
    check("sum(@.foo[0])", "3.0");
    check("mean(@.foo[1])", "4.0");
    check("max(@.foo[2])", "8.0");
    check("len(@.bar)", "2");
    check("len(@.foo[0])", "3");
    check("keys(@.bar)", r#"["a", "b"]"#);
    check("values(@._)", "[0]");
    check("flatten(@.guzo)", "[[1], [2], [3]]");
    check("flatten(@.guzo, 2)", "[1, 2, 3]");
    check("unique(@.foo[0] % 2)", "[0, 1]");
    check("in(1, @.foo[0])", "true");
    check("max_by(@.foo, 0)", "[6.0, 7.0, 8.0]");
}

#[test]
fn test_sort_and_sorted() {
    check("sorted(@.foo[1], true)", "[5.0, 4.0, 3.0]");
    check("sort(@.foo[2], true)", "[8.0, 7.0, 6.0]");
    // sorting an owned argument must not disturb the document
    let doc = foo();
    search("sort(@.foo[2], true)", &doc).unwrap();
    assert_eq!(doc, foo());
}

#[test]
fn test_filters_on_objects_and_chains() {
    check("@._[@ == 0]", r#"{"0": 0}"#);
    // the mask is built from per-row first elements via the [:][0] chain
    check("@.foo[@[:][0] > 1.0]", "[[3.0, 4.0, 5.0], [6.0, 7.0, 8.0]]");
    // filtered-out paths are elided, not left as holes
    check("@.foo[*][@ > 4.5]", "[[5.0], [6.0, 7.0, 8.0]]");
}

#[test]
fn test_projections() {
    check("@.foo{len(@), sum(@[0])}", "[3, 3.0]");
    check("@{b: @.baz, s: s_len(@.baz)}", r#"{"b": "z", "s": 1}"#);
    // the chain continues from the projected value
    check("@.foo{f: @[0]}.f", "[0, 1, 2]");
}

#[test]
fn test_comparisons_and_equality() {
    check("@.foo[0] == j`[0, 5, 2]`", "[true, false, true]");
    check("@.baz == `z`", "true");
    check("@.foo[1] != 4.0", "[true, false, true]");
    check("@.baz =~ g`^[a-z]$`", "true");
}

#[test]
fn test_negation_queries() {
    check("-@.foo[1]", "[-3.0, -4.0, -5.0]");
    check("--@.foo[0][2]", "2");
    check("-@.foo[0][2] ** 2", "4.0");
}

#[test]
fn test_late_bound_function_arguments() {
    check("ifelse(len(@.foo) > 2, `big`, `small`)", r#""big""#);
    check("s_slice(@.baz, 0)", r#""z""#);
    check("concat(@.jub, @.foo[0])", "[0, 1, 2]");
    check("zip(@.foo[0], @.foo[1])", "[[0, 3.0], [1, 4.0], [2, 5.0]]");
}

#[test]
fn test_recursive_search_never_duplicates() {
    let doc = Json::parse(r#"{"a": {"a": {"a": 1}}, "b": [{"a": 2}]}"#).unwrap();
    // the outermost "a" matches and its subtree is not searched again
    assert_eq!(
        search("@..a", &doc).unwrap(),
        Json::parse(r#"[{"a": {"a": 1}}, 2]"#).unwrap()
    );
}

#[test]
fn test_error_kinds() {
    let doc = foo();
    assert!(matches!(
        search("`unterminated", &doc).unwrap_err(),
        RemesPathError::Lex { .. }
    ));
    assert!(matches!(
        search("@.foo[", &doc).unwrap_err(),
        RemesPathError::Parse { .. }
    ));
    assert!(matches!(
        search("@.foo[0] + @.foo[0][:2]", &doc).unwrap_err(),
        RemesPathError::VectorizedArithmetic { .. }
    ));
    // a boolean index whose mask has the wrong length
    assert!(matches!(
        search("@.foo[0][@[:2] > 1]", &doc).unwrap_err(),
        RemesPathError::VectorizedArithmetic { .. }
    ));
    // a boolean index whose mask holds non-bools
    assert!(matches!(
        search("@.foo[0][@]", &doc).unwrap_err(),
        RemesPathError::VectorizedArithmetic { .. }
    ));
    // a non-boolean constant is rejected at parse time
    assert!(matches!(
        search("@.foo[len(@)]", &doc).unwrap_err(),
        RemesPathError::Parse { .. }
    ));
    assert!(matches!(
        search("sum(@.baz)", &doc).unwrap_err(),
        RemesPathError::Type { .. }
    ));
    assert!(matches!(
        search("@..[1:]", &doc).unwrap_err(),
        RemesPathError::NotImplemented { .. }
    ));
}

#[test]
fn test_cached_parser_agrees_with_direct_search() {
    let doc = foo();
    let mut parser = RemesParser::new();
    for _ in 0..3 {
        assert_eq!(
            parser.search("@.foo[0] + @.foo[1]", &doc).unwrap(),
            Json::parse("[3.0, 5.0, 7.0]").unwrap()
        );
    }
    assert_eq!(
        parser.search("range(2, 19, 5)", &doc).unwrap(),
        Json::parse("[2, 7, 12, 17]").unwrap()
    );
}
