//! In-memory query evaluation.
//!
//! A query is a chain of predicates plus optional ordering and a range
//! limit, applied to a document sequence by full scan. Evaluation over
//! non-indexed fields is deliberately linear; indexed equality lookups
//! go through the collection's `fetch_by_indexed_*` methods instead.

use blazedb_codec::{Document, Value};
use std::cmp::Ordering;

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value.
    Eq(String, Value),
    /// Field differs from the value (missing fields differ).
    Ne(String, Value),
    /// Field is strictly less than the value.
    Lt(String, Value),
    /// Field is at most the value.
    Le(String, Value),
    /// Field is strictly greater than the value.
    Gt(String, Value),
    /// Field is at least the value.
    Ge(String, Value),
    /// Text field contains the needle.
    Contains(String, String),
    /// Field is present.
    Exists(String),
    /// Field is absent.
    NotExists(String),
}

impl Predicate {
    /// Evaluates this predicate against `doc`.
    #[must_use]
    pub fn eval(&self, doc: &Document) -> bool {
        match self {
            Predicate::Eq(field, value) => {
                doc.get(field).and_then(|v| v.compare(value)) == Some(Ordering::Equal)
            }
            Predicate::Ne(field, value) => {
                doc.get(field).and_then(|v| v.compare(value)) != Some(Ordering::Equal)
            }
            Predicate::Lt(field, value) => {
                doc.get(field).and_then(|v| v.compare(value)) == Some(Ordering::Less)
            }
            Predicate::Le(field, value) => matches!(
                doc.get(field).and_then(|v| v.compare(value)),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Predicate::Gt(field, value) => {
                doc.get(field).and_then(|v| v.compare(value)) == Some(Ordering::Greater)
            }
            Predicate::Ge(field, value) => matches!(
                doc.get(field).and_then(|v| v.compare(value)),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::Contains(field, needle) => doc
                .get(field)
                .and_then(Value::as_text)
                .is_some_and(|text| text.contains(needle)),
            Predicate::Exists(field) => doc.contains(field),
            Predicate::NotExists(field) => !doc.contains(field),
        }
    }
}

/// A predicate chain with ordering and range limits.
///
/// ```
/// use blazedb_core::{Query, SortOrder, Value};
///
/// let query = Query::new()
///     .eq("status", Value::text("open"))
///     .ge("severity", Value::Int(2))
///     .order_by("createdAt", SortOrder::Descending)
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    predicates: Vec<Predicate>,
    order: Option<(String, SortOrder)>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl Query {
    /// Creates an empty query that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary predicate.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Requires `field == value`.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Eq(field.into(), value.into()))
    }

    /// Requires `field != value`.
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Ne(field.into(), value.into()))
    }

    /// Requires `field < value`.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Lt(field.into(), value.into()))
    }

    /// Requires `field <= value`.
    #[must_use]
    pub fn le(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Le(field.into(), value.into()))
    }

    /// Requires `field > value`.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Gt(field.into(), value.into()))
    }

    /// Requires `field >= value`.
    #[must_use]
    pub fn ge(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Ge(field.into(), value.into()))
    }

    /// Requires the text field to contain `needle`.
    #[must_use]
    pub fn contains(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.filter(Predicate::Contains(field.into(), needle.into()))
    }

    /// Requires `field` to be present.
    #[must_use]
    pub fn exists(self, field: impl Into<String>) -> Self {
        self.filter(Predicate::Exists(field.into()))
    }

    /// Orders results by `field`.
    ///
    /// Documents missing the field, or with incomparable values, sort
    /// after everything else.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some((field.into(), order));
        self
    }

    /// Skips the first `n` results.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Caps the result count at `n`.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Applies the query to a document sequence.
    #[must_use]
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut results: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.predicates.iter().all(|p| p.eval(doc)))
            .collect();

        if let Some((field, order)) = &self.order {
            results.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let skip = self.offset.unwrap_or(0);
        let take = self.limit.unwrap_or(usize::MAX);
        results.into_iter().skip(skip).take(take).collect()
    }
}
