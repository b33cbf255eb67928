//! In-memory backend.
//!
//! Evaluates conditions over rows held in a [`MemoryTable`]. Semantics follow
//! the PostgreSQL backend: containment is case-insensitive and literal,
//! patterns are regular expressions used verbatim, `NULL` never matches, and
//! ordering puts `NULL` last when ascending and first when descending.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{Backend, DescribedColumn, Record};
use crate::error::MemoryError;
use crate::table::{Direction, Literal, ValueType};

/// A schema plus rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<DescribedColumn>,
    rows: Vec<Record>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named column.
    pub fn column(mut self, name: &str, value_type: ValueType) -> Self {
        self.columns.push(DescribedColumn::new(name, value_type));
        self
    }

    /// Declare a column without a name, as an un-aliased expression would be.
    pub fn unnamed_column(mut self, value_type: ValueType) -> Self {
        self.columns.push(DescribedColumn {
            name: None,
            value_type,
        });
        self
    }

    /// Append a row. Non-object values are ignored.
    pub fn row(mut self, row: Value) -> Self {
        if let Value::Object(record) = row {
            self.rows.push(record);
        }
        self
    }

    /// Append several rows.
    pub fn rows<I: IntoIterator<Item = Value>>(self, rows: I) -> Self {
        rows.into_iter().fold(self, MemoryTable::row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Condition tree evaluated by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryCondition {
    Equals { field: String, literal: Literal },
    ContainsCi { field: String, needle: String },
    Pattern { field: String, pattern: String },
    Overlaps { field: String, literal: Literal },
    All(Vec<MemoryCondition>),
    Any(Vec<MemoryCondition>),
}

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryOrderKey {
    pub field: String,
    pub direction: Direction,
}

/// A table with filters and ordering folded in.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    table: Arc<MemoryTable>,
    conditions: Vec<MemoryCondition>,
    order: Vec<MemoryOrderKey>,
}

impl MemoryQuery {
    pub fn new(table: MemoryTable) -> Self {
        Self::from_shared(Arc::new(table))
    }

    pub fn from_shared(table: Arc<MemoryTable>) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Filters applied so far, in application order.
    pub fn conditions(&self) -> &[MemoryCondition] {
        &self.conditions
    }

    /// ORDER BY keys, highest precedence first.
    pub fn order_keys(&self) -> &[MemoryOrderKey] {
        &self.order
    }

    fn matching_rows(&self) -> Result<Vec<&Record>, MemoryError> {
        let compiled = self
            .conditions
            .iter()
            .map(Compiled::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self
            .table
            .rows
            .iter()
            .filter(|row| compiled.iter().all(|c| c.matches(row)))
            .collect())
    }
}

/// Stateless backend over [`MemoryQuery`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

#[async_trait]
impl Backend for MemoryBackend {
    type Expr = String;
    type Condition = MemoryCondition;
    type OrderKey = MemoryOrderKey;
    type Query = MemoryQuery;
    type Error = MemoryError;

    fn field(&self, name: &str) -> String {
        name.to_string()
    }

    fn conjoin(&self, conditions: Vec<MemoryCondition>) -> MemoryCondition {
        MemoryCondition::All(conditions)
    }

    fn disjoin(&self, conditions: Vec<MemoryCondition>) -> MemoryCondition {
        MemoryCondition::Any(conditions)
    }

    fn equals(&self, expr: &String, literal: &Literal) -> MemoryCondition {
        MemoryCondition::Equals {
            field: expr.clone(),
            literal: literal.clone(),
        }
    }

    fn contains_ci(&self, expr: &String, needle: &str) -> MemoryCondition {
        MemoryCondition::ContainsCi {
            field: expr.clone(),
            needle: needle.to_string(),
        }
    }

    fn matches_pattern(&self, expr: &String, pattern: &str) -> MemoryCondition {
        MemoryCondition::Pattern {
            field: expr.clone(),
            pattern: pattern.to_string(),
        }
    }

    fn array_overlaps(&self, expr: &String, literal: &Literal) -> MemoryCondition {
        MemoryCondition::Overlaps {
            field: expr.clone(),
            literal: literal.clone(),
        }
    }

    fn ascending(&self, expr: &String) -> MemoryOrderKey {
        MemoryOrderKey {
            field: expr.clone(),
            direction: Direction::Asc,
        }
    }

    fn descending(&self, expr: &String) -> MemoryOrderKey {
        MemoryOrderKey {
            field: expr.clone(),
            direction: Direction::Desc,
        }
    }

    fn filter(&self, mut query: MemoryQuery, condition: MemoryCondition) -> MemoryQuery {
        query.conditions.push(condition);
        query
    }

    fn order_by(&self, mut query: MemoryQuery, keys: Vec<MemoryOrderKey>) -> MemoryQuery {
        query.order.extend(keys);
        query
    }

    async fn count(&self, query: &MemoryQuery) -> Result<u64, MemoryError> {
        Ok(query.matching_rows()?.len() as u64)
    }

    async fn fetch(
        &self,
        query: &MemoryQuery,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>, MemoryError> {
        let mut rows = query.matching_rows()?;

        if !query.order.is_empty() {
            // sort_by is stable, so ties keep insertion order.
            rows.sort_by(|a, b| compare_rows(a, b, &query.order));
        }

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        debug!(
            matched = rows.len(),
            offset, limit, "paging in-memory result"
        );

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn describe(&self, query: &MemoryQuery) -> Result<Vec<DescribedColumn>, MemoryError> {
        Ok(query.table.columns.clone())
    }
}

/// A condition with its patterns compiled.
enum Compiled<'a> {
    Equals(&'a str, &'a Literal),
    ContainsCi(&'a str, String),
    Pattern(&'a str, Regex),
    Overlaps(&'a str, &'a Literal),
    All(Vec<Compiled<'a>>),
    Any(Vec<Compiled<'a>>),
}

impl<'a> Compiled<'a> {
    fn new(condition: &'a MemoryCondition) -> Result<Self, MemoryError> {
        Ok(match condition {
            MemoryCondition::Equals { field, literal } => Compiled::Equals(field, literal),
            MemoryCondition::ContainsCi { field, needle } => {
                Compiled::ContainsCi(field, needle.to_lowercase())
            }
            MemoryCondition::Pattern { field, pattern } => {
                Compiled::Pattern(field, Regex::new(pattern)?)
            }
            MemoryCondition::Overlaps { field, literal } => Compiled::Overlaps(field, literal),
            MemoryCondition::All(parts) => Compiled::All(
                parts
                    .iter()
                    .map(Compiled::new)
                    .collect::<Result<_, _>>()?,
            ),
            MemoryCondition::Any(parts) => Compiled::Any(
                parts
                    .iter()
                    .map(Compiled::new)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn matches(&self, row: &Record) -> bool {
        match self {
            Compiled::Equals(field, literal) => {
                row.get(*field).is_some_and(|v| literal_matches(literal, v))
            }
            Compiled::ContainsCi(field, needle) => row
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
            Compiled::Pattern(field, regex) => row
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
            Compiled::Overlaps(field, literal) => row
                .get(*field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|v| literal_matches(literal, v))),
            Compiled::All(parts) => parts.iter().all(|p| p.matches(row)),
            Compiled::Any(parts) => parts.iter().any(|p| p.matches(row)),
        }
    }
}

fn literal_matches(literal: &Literal, value: &Value) -> bool {
    match (literal, value) {
        (Literal::Integer(i), Value::Number(n)) => {
            n.as_i64() == Some(*i) || n.as_f64() == Some(*i as f64)
        }
        (Literal::Float(f), Value::Number(n)) => n.as_f64() == Some(*f),
        (Literal::Text(s), Value::String(v)) => s == v,
        _ => false,
    }
}

fn compare_rows(a: &Record, b: &Record, keys: &[MemoryOrderKey]) -> Ordering {
    for key in keys {
        let left = a.get(&key.field).unwrap_or(&Value::Null);
        let right = b.get(&key.field).unwrap_or(&Value::Null);

        let ordering = match key.direction {
            Direction::Asc => compare_values(left, right),
            Direction::Desc => compare_values(left, right).reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over JSON scalars with `NULL` sorting after everything.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ordering = compare_values(l, r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fruit() -> MemoryQuery {
        MemoryQuery::new(
            MemoryTable::new()
                .column("name", ValueType::Text)
                .column("price", ValueType::Float)
                .column("tags", ValueType::Array(Box::new(ValueType::Text)))
                .rows([
                    json!({"name": "Apple", "price": 1.5, "tags": ["red", "sweet"]}),
                    json!({"name": "Banana", "price": 0.5, "tags": ["yellow"]}),
                    json!({"name": "apricot", "price": null, "tags": []}),
                    json!({"name": null, "price": 3, "tags": null}),
                ]),
        )
    }

    fn names(rows: &[Record]) -> Vec<Option<&str>> {
        rows.iter()
            .map(|r| r.get("name").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn contains_is_case_insensitive_and_skips_null() {
        let backend = MemoryBackend;
        let cond = backend.contains_ci(&"name".into(), "AP");
        let query = backend.filter(fruit(), cond);

        assert_eq!(backend.count(&query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn pattern_is_case_sensitive_and_verbatim() {
        let backend = MemoryBackend;
        let cond = backend.matches_pattern(&"name".into(), "^A.*");
        let query = backend.filter(fruit(), cond);

        let rows = backend.fetch(&query, 0, 10).await.unwrap();
        assert_eq!(names(&rows), vec![Some("Apple")]);
    }

    #[tokio::test]
    async fn invalid_pattern_is_execution_error() {
        let backend = MemoryBackend;
        let cond = backend.matches_pattern(&"name".into(), "(unclosed");
        let query = backend.filter(fruit(), cond);

        assert!(matches!(
            backend.count(&query).await,
            Err(MemoryError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn equality_across_number_representations() {
        let backend = MemoryBackend;
        let cond = backend.equals(&"price".into(), &Literal::Integer(3));
        let query = backend.filter(fruit(), cond);
        assert_eq!(backend.count(&query).await.unwrap(), 1);

        let cond = backend.equals(&"price".into(), &Literal::Float(0.5));
        let query = backend.filter(fruit(), cond);
        assert_eq!(backend.count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn overlaps_matches_any_element() {
        let backend = MemoryBackend;
        let cond = backend.array_overlaps(&"tags".into(), &Literal::Text("sweet".into()));
        let query = backend.filter(fruit(), cond);

        let rows = backend.fetch(&query, 0, 10).await.unwrap();
        assert_eq!(names(&rows), vec![Some("Apple")]);
    }

    #[tokio::test]
    async fn ordering_places_nulls_like_postgres() {
        let backend = MemoryBackend;

        let asc = backend.order_by(fruit(), vec![backend.ascending(&"price".into())]);
        let rows = backend.fetch(&asc, 0, 10).await.unwrap();
        assert_eq!(
            names(&rows),
            vec![Some("Banana"), Some("Apple"), None, Some("apricot")]
        );

        let desc = backend.order_by(fruit(), vec![backend.descending(&"price".into())]);
        let rows = backend.fetch(&desc, 0, 10).await.unwrap();
        assert_eq!(
            names(&rows),
            vec![Some("apricot"), None, Some("Apple"), Some("Banana")]
        );
    }

    #[tokio::test]
    async fn paging_skips_and_takes() {
        let backend = MemoryBackend;
        let query = fruit();

        assert_eq!(backend.fetch(&query, 1, 2).await.unwrap().len(), 2);
        assert_eq!(backend.fetch(&query, 3, 10).await.unwrap().len(), 1);
        assert!(backend.fetch(&query, 10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn describe_reports_schema() {
        let backend = MemoryBackend;
        let columns = backend.describe(&fruit()).await.unwrap();

        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name.as_deref(), Some("name"));
        assert_eq!(columns[1].value_type, ValueType::Float);
    }

    #[test]
    fn non_object_rows_are_ignored() {
        let table = MemoryTable::new().row(json!([1, 2])).row(json!({"a": 1}));
        assert_eq!(table.len(), 1);
    }
}
