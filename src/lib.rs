//! RemesPath: a query language and execution engine over in-memory JSON.
//!
//! A query is lexed, parsed into a compiled query value, and applied to a
//! JSON document. A query that never mentions the current input `@`
//! compiles to a constant; anything else compiles to a late-bound function
//! of the input that can be applied repeatedly.
//!
//! ```
//! use remespath::{compile, search, apply, Json};
//!
//! let doc = Json::parse(r#"{"foo": [1, 2, 3]}"#).unwrap();
//! assert_eq!(search("@.foo[1] + 10", &doc).unwrap(), Json::Int(12));
//!
//! let compiled = compile("@.foo[:2]").unwrap();
//! assert_eq!(
//!     apply(&compiled, &doc).unwrap(),
//!     Json::Array(vec![Json::Int(1), Json::Int(2)])
//! );
//! ```

pub mod binop;
pub mod cache;
pub mod error;
pub mod eval;
pub mod functions;
pub mod indexer;
pub mod json;
pub mod lexer;
pub mod parser;

pub use error::RemesPathError;
pub use json::{CurJson, Dtype, Json, JsonRegex, JsonSlice};

use cache::QueryCache;

/// Compile a query into a constant value or a late-bound function of the
/// input.
pub fn compile(query: &str) -> Result<Json, RemesPathError> {
    parser::compile_query(query)
}

/// Apply a compiled query to an input document.
pub fn apply(compiled: &Json, input: &Json) -> Result<Json, RemesPathError> {
    eval::apply(compiled, input)
}

/// Compile and apply in one step.
pub fn search(query: &str, input: &Json) -> Result<Json, RemesPathError> {
    apply(&compile(query)?, input)
}

const DEFAULT_CACHE_CAPACITY: usize = 64;

/// The caching front door to the engine: compiled queries are kept in an
/// LRU-bounded cache keyed by query text.
#[derive(Debug, Clone)]
pub struct RemesParser {
    cache: QueryCache,
}

impl RemesParser {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        RemesParser {
            cache: QueryCache::new(capacity),
        }
    }

    /// Compile a query, reusing the cached compilation when one exists.
    pub fn compile(&mut self, query: &str) -> Result<Json, RemesPathError> {
        if let Some(compiled) = self.cache.get(query) {
            log::debug!("query cache hit for {query:?}");
            return Ok(compiled.clone());
        }
        let compiled = compile(query)?;
        self.cache.add(query, compiled.clone());
        Ok(compiled)
    }

    pub fn search(&mut self, query: &str, input: &Json) -> Result<Json, RemesPathError> {
        apply(&self.compile(query)?, input)
    }
}

impl Default for RemesParser {
    fn default() -> Self {
        Self::new()
    }
}
