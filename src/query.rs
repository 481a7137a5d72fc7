//! Predicates and their cache keys
//!
//! A [`Predicate`] is a pure test over a [`Document`] with an optional
//! [`QueryKey`]. Predicates without a key are never cached.
//!
//! [`Query`] is the bundled expression tree. Its key is the JSON
//! serialization of the tree's shape, so two structurally equal queries share
//! one cache entry no matter where they were built:
//!
//! ```rust
//! use ouroboros_docstore::query::{field, Predicate};
//!
//! let a = field("age").lt(10) & field("name").exists();
//! let b = field("age").lt(10) & field("name").exists();
//! assert_eq!(a.cache_key(), b.cache_key());
//! ```

use crate::document::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Stable identity of a cacheable predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    /// Wrap an already-normalized key string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A side-effect-free document test.
///
/// Implementations must be deterministic, and two predicates returning the
/// same key must test the same condition. Neither is checked at runtime; a
/// violation leaves cached results silently wrong.
pub trait Predicate: Send + Sync {
    /// Does `doc` satisfy the predicate?
    fn evaluate(&self, doc: &Document) -> bool;

    /// Cache identity, or `None` to bypass the cache
    fn cache_key(&self) -> Option<QueryKey>;
}

impl<P: Predicate + ?Sized> Predicate for Arc<P> {
    fn evaluate(&self, doc: &Document) -> bool {
        (**self).evaluate(doc)
    }

    fn cache_key(&self) -> Option<QueryKey> {
        (**self).cache_key()
    }
}

/// Comparison operator used by [`Query::Compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            Comparison::Eq => ordering == Some(Ordering::Equal),
            Comparison::Ne => ordering != Some(Ordering::Equal),
            Comparison::Lt => ordering == Some(Ordering::Less),
            Comparison::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Comparison::Gt => ordering == Some(Ordering::Greater),
            Comparison::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

type AdHocFn = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

/// Condition expression tree
#[derive(Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Query {
    /// Matches every document
    All,

    /// Compare the value at `path` against `value`
    Compare {
        path: String,
        cmp: Comparison,
        value: Value,
    },

    /// The field at `path` is present
    Exists { path: String },

    /// The value at `path` equals one of `values`
    OneOf { path: String, values: Vec<Value> },

    And { left: Box<Query>, right: Box<Query> },

    Or { left: Box<Query>, right: Box<Query> },

    Not { query: Box<Query> },

    /// Arbitrary closure; has no structural identity and is never cached
    #[serde(skip_serializing)]
    AdHoc { test: AdHocFn },
}

impl Query {
    /// Query matching every document
    pub fn all() -> Self {
        Query::All
    }

    /// Wrap a closure as an uncacheable query
    pub fn ad_hoc<F>(test: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        Query::AdHoc {
            test: Arc::new(test),
        }
    }

    pub fn and(self, other: Query) -> Self {
        Query::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Query) -> Self {
        Query::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn negate(self) -> Self {
        Query::Not {
            query: Box::new(self),
        }
    }

    /// Whether the tree is free of ad hoc closures
    pub fn is_cacheable(&self) -> bool {
        match self {
            Query::All | Query::Compare { .. } | Query::Exists { .. } | Query::OneOf { .. } => {
                true
            }
            Query::And { left, right } | Query::Or { left, right } => {
                left.is_cacheable() && right.is_cacheable()
            }
            Query::Not { query } => query.is_cacheable(),
            Query::AdHoc { .. } => false,
        }
    }
}

impl Predicate for Query {
    fn evaluate(&self, doc: &Document) -> bool {
        match self {
            Query::All => true,
            Query::Compare { path, cmp, value } => match doc.lookup(path) {
                Some(actual) => cmp.holds(compare_values(actual, value)),
                None => false,
            },
            Query::Exists { path } => doc.lookup(path).is_some(),
            Query::OneOf { path, values } => match doc.lookup(path) {
                Some(actual) => values
                    .iter()
                    .any(|v| compare_values(actual, v) == Some(Ordering::Equal)),
                None => false,
            },
            Query::And { left, right } => left.evaluate(doc) && right.evaluate(doc),
            Query::Or { left, right } => left.evaluate(doc) || right.evaluate(doc),
            Query::Not { query } => !query.evaluate(doc),
            Query::AdHoc { test } => test(doc),
        }
    }

    fn cache_key(&self) -> Option<QueryKey> {
        if !self.is_cacheable() {
            return None;
        }
        serde_json::to_string(self).ok().map(QueryKey)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::All => write!(f, "All"),
            Query::Compare { path, cmp, value } => write!(f, "({} {:?} {})", path, cmp, value),
            Query::Exists { path } => write!(f, "({} exists)", path),
            Query::OneOf { path, values } => write!(f, "({} in {:?})", path, values),
            Query::And { left, right } => write!(f, "({:?} & {:?})", left, right),
            Query::Or { left, right } => write!(f, "({:?} | {:?})", left, right),
            Query::Not { query } => write!(f, "!{:?}", query),
            Query::AdHoc { .. } => write!(f, "AdHoc"),
        }
    }
}

impl std::ops::BitAnd for Query {
    type Output = Query;

    fn bitand(self, rhs: Query) -> Query {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Query {
    type Output = Query;

    fn bitor(self, rhs: Query) -> Query {
        self.or(rhs)
    }
}

impl std::ops::Not for Query {
    type Output = Query;

    fn not(self) -> Query {
        self.negate()
    }
}

/// Ordering between two JSON values, `None` when they are not comparable.
///
/// Two integers compare exactly. Any other pair of numbers compares as
/// `f64`, so `1` equals `1.0`. Arrays and objects only compare equal to an
/// identical value.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) if a == b => {
            Some(Ordering::Equal)
        }
        _ => None,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (as_integer(x), as_integer(y)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

// i128 holds every i64 and u64
fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Start a condition on the field at `path` (dot-separated for nesting)
pub fn field(path: impl Into<String>) -> FieldRef {
    FieldRef { path: path.into() }
}

/// Builder returned by [`field`]
#[derive(Debug, Clone)]
pub struct FieldRef {
    path: String,
}

impl FieldRef {
    fn compare(self, cmp: Comparison, value: impl Into<Value>) -> Query {
        Query::Compare {
            path: self.path,
            cmp,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Query {
        self.compare(Comparison::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Query {
        self.compare(Comparison::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Query {
        self.compare(Comparison::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Query {
        self.compare(Comparison::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Query {
        self.compare(Comparison::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Query {
        self.compare(Comparison::Ge, value)
    }

    pub fn exists(self) -> Query {
        Query::Exists { path: self.path }
    }

    pub fn one_of<I, V>(self, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::OneOf {
            path: self.path,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{fields, DocId};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::new(DocId(1), fields(value))
    }

    #[test]
    fn test_comparisons() {
        let d = doc(json!({"age": 5, "name": "bob", "ok": true}));

        assert!(field("age").eq(5).evaluate(&d));
        assert!(field("age").eq(5.0).evaluate(&d));
        assert!(field("age").lt(10).evaluate(&d));
        assert!(field("age").le(5).evaluate(&d));
        assert!(!field("age").gt(5).evaluate(&d));
        assert!(field("age").ge(5).evaluate(&d));
        assert!(field("age").ne(6).evaluate(&d));
        assert!(field("name").gt("alice").evaluate(&d));
        assert!(field("ok").eq(true).evaluate(&d));
    }

    #[test]
    fn test_missing_and_mismatched_fields() {
        let d = doc(json!({"age": "five"}));

        assert!(!field("age").lt(10).evaluate(&d));
        assert!(!field("age").eq(5).evaluate(&d));
        assert!(field("age").ne(5).evaluate(&d));

        assert!(!field("height").ne(1).evaluate(&d));
        assert!(!field("height").exists().evaluate(&d));
        assert!(field("age").exists().evaluate(&d));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let d = doc(json!({"n": 9007199254740993u64, "neg": -3}));

        assert!(!field("n").eq(9007199254740992u64).evaluate(&d));
        assert!(field("n").eq(9007199254740993u64).evaluate(&d));
        assert!(field("n").gt(9007199254740992u64).evaluate(&d));
        assert!(field("n").gt(-1).evaluate(&d));
        assert!(field("neg").lt(u64::MAX).evaluate(&d));
        assert!(field("neg").eq(-3.0).evaluate(&d));
    }

    #[test]
    fn test_nested_path_and_one_of() {
        let d = doc(json!({"address": {"city": "Oslo"}, "tags": ["a", "b"]}));

        assert!(field("address.city").eq("Oslo").evaluate(&d));
        assert!(field("address.city").one_of(["Paris", "Oslo"]).evaluate(&d));
        assert!(!field("address.city").one_of(["Paris"]).evaluate(&d));
        assert!(field("tags").eq(json!(["a", "b"])).evaluate(&d));
        assert!(!field("tags").lt(json!(["a", "c"])).evaluate(&d));
    }

    #[test]
    fn test_combinators() {
        let d = doc(json!({"int": 1, "char": "a"}));

        assert!((field("int").eq(1) & field("char").eq("a")).evaluate(&d));
        assert!(!(field("int").eq(1) & field("char").eq("b")).evaluate(&d));
        assert!((field("int").eq(2) | field("char").eq("a")).evaluate(&d));
        assert!((!field("int").eq(2)).evaluate(&d));
        assert!(Query::all().evaluate(&d));
    }

    #[test]
    fn test_structural_cache_keys() {
        let a = field("age").lt(10);
        let b = field("age").lt(10);
        let c = field("age").le(10);

        assert!(a.cache_key().is_some());
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());

        let left = field("x").eq(1) & field("y").eq(2);
        let right = field("y").eq(2) & field("x").eq(1);
        assert_ne!(left.cache_key(), right.cache_key());
    }

    #[test]
    fn test_integer_and_float_literals_have_distinct_keys() {
        assert_ne!(field("n").eq(1).cache_key(), field("n").eq(1.0).cache_key());
    }

    #[test]
    fn test_ad_hoc_is_uncacheable() {
        let q = Query::ad_hoc(|d| d.get("int").is_some());
        assert!(q.cache_key().is_none());
        assert!(!q.is_cacheable());

        let mixed = field("int").eq(1) & Query::ad_hoc(|_| true);
        assert!(mixed.cache_key().is_none());

        let d = doc(json!({"int": 1}));
        assert!(mixed.evaluate(&d));
    }

    #[test]
    fn test_debug_output() {
        let q = field("age").lt(10) | Query::ad_hoc(|_| false);
        let text = format!("{:?}", q);
        assert!(text.contains("age Lt 10"));
        assert!(text.contains("AdHoc"));
    }
}
