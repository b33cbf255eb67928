//! Storage collaborators.
//!
//! The engine never talks to storage directly. Everything it needs (predicate
//! and ordering primitives, query transformation, counting and fetching, and
//! column introspection) goes through [`Backend`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::table::{Literal, ValueType};

/// One result row keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A projected column as reported by [`Backend::describe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedColumn {
    /// Column name, if the projection gives it one.
    pub name: Option<String>,
    /// Declared value type.
    pub value_type: ValueType,
}

impl DescribedColumn {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: Some(name.into()),
            value_type,
        }
    }
}

/// Query-building and execution interface of a storage engine.
///
/// Queries are immutable values: `filter` and `order_by` return a new query.
/// `conjoin` and `disjoin` are only called with two or more conditions; the
/// neutral element is handled by [`Predicate`](crate::Predicate).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Handle for a column expression.
    type Expr: Clone + Send + Sync + 'static;
    /// Boolean condition usable as a filter.
    type Condition: Clone + Send + Sync;
    /// One key of an ORDER BY list.
    type OrderKey: Clone + Send + Sync;
    /// A base or composed query.
    type Query: Clone + Send + Sync;
    /// Execution error, passed to callers unmodified.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Expression referring to a projected column of the base query.
    fn field(&self, name: &str) -> Self::Expr;

    fn conjoin(&self, conditions: Vec<Self::Condition>) -> Self::Condition;
    fn disjoin(&self, conditions: Vec<Self::Condition>) -> Self::Condition;

    fn equals(&self, expr: &Self::Expr, literal: &Literal) -> Self::Condition;
    /// Case-insensitive, literal substring containment.
    fn contains_ci(&self, expr: &Self::Expr, needle: &str) -> Self::Condition;
    /// Regular expression match, pattern used verbatim.
    fn matches_pattern(&self, expr: &Self::Expr, pattern: &str) -> Self::Condition;
    /// Array column shares at least one element with `[literal]`.
    fn array_overlaps(&self, expr: &Self::Expr, literal: &Literal) -> Self::Condition;

    fn ascending(&self, expr: &Self::Expr) -> Self::OrderKey;
    fn descending(&self, expr: &Self::Expr) -> Self::OrderKey;

    fn filter(&self, query: Self::Query, condition: Self::Condition) -> Self::Query;
    /// Append keys to the query's ORDER BY list, preserving their order.
    fn order_by(&self, query: Self::Query, keys: Vec<Self::OrderKey>) -> Self::Query;

    /// Number of rows the query yields, ignoring paging.
    async fn count(&self, query: &Self::Query) -> Result<u64, Self::Error>;

    /// Rows `offset..offset + limit` of the query.
    async fn fetch(
        &self,
        query: &Self::Query,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>, Self::Error>;

    /// Projected columns of the query.
    async fn describe(&self, query: &Self::Query) -> Result<Vec<DescribedColumn>, Self::Error>;
}
