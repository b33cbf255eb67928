//! Column behaviors.
//!
//! A column knows how to order itself, how to turn a search token into a
//! predicate, and how to pull its value out of a result row. The built-in
//! variants cover the common shapes; anything else can implement [`Column`]
//! directly.

use serde_json::Value;

use super::classify::{Classification, NumericKind};
use super::predicate::{Predicate, any, build_predicate};
use super::request::{Direction, SearchTerm};
use crate::backend::{Backend, Record};

/// Behavior of one table column.
///
/// Every method has a default, so a column implements only what it
/// supports. The defaults describe a column that neither orders nor
/// searches and reads its value from the row field of the same name.
pub trait Column<B: Backend + ?Sized>: Send + Sync {
    /// Sort keys for the direction, highest precedence first.
    fn order(&self, _backend: &B, _direction: Direction) -> Vec<B::OrderKey> {
        Vec::new()
    }

    /// Predicate for one search token.
    fn search(&self, _backend: &B, _token: &str, _regex: bool) -> Predicate<B::Condition> {
        Predicate::Neutral
    }

    /// Predicate for the column's own filter. An empty filter is neutral.
    fn filter(&self, backend: &B, term: &SearchTerm) -> Predicate<B::Condition> {
        if term.is_empty() {
            Predicate::Neutral
        } else {
            self.search(backend, &term.value, term.regex)
        }
    }

    /// The column's value in a result row.
    fn extract(&self, name: &str, record: &Record) -> Value {
        record.get(name).cloned().unwrap_or(Value::Null)
    }
}

fn sort_key<B: Backend + ?Sized>(backend: &B, expr: &B::Expr, direction: Direction) -> B::OrderKey {
    match direction {
        Direction::Asc => backend.ascending(expr),
        Direction::Desc => backend.descending(expr),
    }
}

/// Displayed but never searched or ordered.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseColumn;

impl<B: Backend + ?Sized> Column<B> for BaseColumn {}

/// A single text field.
#[derive(Debug, Clone)]
pub struct TextColumn<E> {
    pub expr: E,
}

impl<E> TextColumn<E> {
    pub fn new(expr: E) -> Self {
        Self { expr }
    }
}

impl<B, E> Column<B> for TextColumn<E>
where
    B: Backend<Expr = E> + ?Sized,
    E: Send + Sync,
{
    fn order(&self, backend: &B, direction: Direction) -> Vec<B::OrderKey> {
        vec![sort_key(backend, &self.expr, direction)]
    }

    fn search(&self, backend: &B, token: &str, regex: bool) -> Predicate<B::Condition> {
        build_predicate(backend, &self.expr, &Classification::Text, token, regex)
    }
}

/// A single numeric field. Search tokens must parse as `kind`.
#[derive(Debug, Clone)]
pub struct NumericColumn<E> {
    pub expr: E,
    pub kind: NumericKind,
}

impl<E> NumericColumn<E> {
    pub fn new(expr: E, kind: NumericKind) -> Self {
        Self { expr, kind }
    }

    pub fn integer(expr: E) -> Self {
        Self::new(expr, NumericKind::Integer)
    }

    pub fn float(expr: E) -> Self {
        Self::new(expr, NumericKind::Float)
    }
}

impl<B, E> Column<B> for NumericColumn<E>
where
    B: Backend<Expr = E> + ?Sized,
    E: Send + Sync,
{
    fn order(&self, backend: &B, direction: Direction) -> Vec<B::OrderKey> {
        vec![sort_key(backend, &self.expr, direction)]
    }

    fn search(&self, backend: &B, token: &str, regex: bool) -> Predicate<B::Condition> {
        let classification = Classification::Numeric(self.kind);
        build_predicate(backend, &self.expr, &classification, token, regex)
    }
}

/// An array field. A token matches rows whose array contains it.
#[derive(Debug, Clone)]
pub struct ListColumn<E> {
    pub expr: E,
    pub element: Classification,
}

impl<E> ListColumn<E> {
    pub fn new(expr: E, element: Classification) -> Self {
        Self { expr, element }
    }
}

impl<B, E> Column<B> for ListColumn<E>
where
    B: Backend<Expr = E> + ?Sized,
    E: Send + Sync,
{
    fn order(&self, backend: &B, direction: Direction) -> Vec<B::OrderKey> {
        vec![sort_key(backend, &self.expr, direction)]
    }

    fn search(&self, backend: &B, token: &str, regex: bool) -> Predicate<B::Condition> {
        let classification = Classification::ListOf(Box::new(self.element.clone()));
        build_predicate(backend, &self.expr, &classification, token, regex)
    }
}

/// Several backing fields shown as one column.
///
/// Orders by every field in declaration order; a token matches when it
/// matches any of the fields.
#[derive(Debug, Clone)]
pub struct CompositeColumn<E> {
    pub fields: Vec<(E, Classification)>,
}

impl<E> CompositeColumn<E> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, expr: E, classification: Classification) -> Self {
        self.fields.push((expr, classification));
        self
    }
}

impl<E> Default for CompositeColumn<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, E> Column<B> for CompositeColumn<E>
where
    B: Backend<Expr = E> + ?Sized,
    E: Send + Sync,
{
    fn order(&self, backend: &B, direction: Direction) -> Vec<B::OrderKey> {
        self.fields
            .iter()
            .map(|(expr, _)| sort_key(backend, expr, direction))
            .collect()
    }

    fn search(&self, backend: &B, token: &str, regex: bool) -> Predicate<B::Condition> {
        any(
            backend,
            self.fields.iter().map(|(expr, classification)| {
                build_predicate(backend, expr, classification, token, regex)
            }),
        )
    }
}

/// A projected column of an introspected base query.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor<E> {
    pub name: String,
    pub classification: Classification,
    pub expr: E,
}

impl<B, E> Column<B> for ColumnDescriptor<E>
where
    B: Backend<Expr = E> + ?Sized,
    E: Send + Sync,
{
    fn order(&self, backend: &B, direction: Direction) -> Vec<B::OrderKey> {
        vec![sort_key(backend, &self.expr, direction)]
    }

    fn search(&self, backend: &B, token: &str, regex: bool) -> Predicate<B::Condition> {
        build_predicate(backend, &self.expr, &self.classification, token, regex)
    }
}
