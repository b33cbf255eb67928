#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Declarative table tests.
//!
//! Tables built from explicit column behaviors, served from flattened
//! query strings against the in-memory backend.

use serde_json::{Value, json};
use tabula_kernel::backend::memory::{MemoryCondition, MemoryOrderKey};
use tabula_kernel::{
    BaseColumn, Backend, Classification, Column, CompositeColumn, ConfigError, Direction,
    ListColumn, MemoryBackend, MemoryQuery, NumericColumn, NumericKind, Predicate, Record,
    SearchTerm, Table, TextColumn,
};
use tabula_test_utils::{TestColumn, fruits, request};

fn fruit_table() -> Table<MemoryBackend> {
    let backend = MemoryBackend;
    Table::builder()
        .column("name", "Fruit", TextColumn::new(backend.field("name")))
        .column("price", "Price", NumericColumn::float(backend.field("price")))
        .column("stock", "In stock", NumericColumn::integer(backend.field("stock")))
        .column(
            "tags",
            "Tags",
            ListColumn::new(backend.field("tags"), Classification::Text),
        )
        .build()
        .unwrap()
}

fn base() -> MemoryQuery {
    MemoryQuery::new(fruits())
}

fn names(data: &[Value]) -> Vec<Value> {
    data.iter().map(|row| row[0].clone()).collect()
}

#[tokio::test]
async fn test_rows_follow_declaration_order() {
    let table = fruit_table();
    let query = request(&["name", "price", "stock", "tags"])
        .with_draw(4)
        .page(0, 2)
        .query_string();

    let envelope = table
        .respond_query_string(&MemoryBackend, &base(), &query)
        .await
        .unwrap();

    assert_eq!(envelope.draw, 4);
    assert_eq!(envelope.records_total, 6);
    assert_eq!(
        envelope.data,
        vec![
            json!(["Apple", 1.5, 10, ["red", "sweet"]]),
            json!(["Banana", 0.5, 25, ["yellow"]]),
        ]
    );

    let columns = envelope.columns.unwrap();
    let labels: Vec<&str> = columns.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Fruit", "Price", "In stock", "Tags"]);
}

#[tokio::test]
async fn test_positional_order_and_invalid_index() {
    let table = fruit_table();
    let query = request(&["name", "price", "stock", "tags"])
        .order(-1, "asc")
        .order(9, "asc")
        .order(2, "desc")
        .query_string();

    let envelope = table
        .respond_query_string(&MemoryBackend, &base(), &query)
        .await
        .unwrap();

    assert_eq!(
        names(&envelope.data),
        vec![
            json!("Banana"),
            json!("Apple"),
            json!("Cherry"),
            json!("Elderberry"),
            json!("apricot"),
            json!("Date"),
        ]
    );
}

#[tokio::test]
async fn test_unknown_direction_is_ignored() {
    let table = fruit_table();
    let envelope = table
        .respond_query_string(
            &MemoryBackend,
            &base(),
            "order[0][column]=2&order[0][dir]=DESC&order[1][column]=1&order[1][dir]=desc",
        )
        .await
        .unwrap();

    // Only the price key applies; NULL sorts first descending.
    assert_eq!(
        names(&envelope.data),
        vec![
            json!("apricot"),
            json!("Elderberry"),
            json!("Cherry"),
            json!("Date"),
            json!("Apple"),
            json!("Banana"),
        ]
    );
}

#[tokio::test]
async fn test_column_filter_from_query_string() {
    let table = fruit_table();
    let query = request(&["name", "price", "stock", "tags"])
        .with_column(3, TestColumn::new("tags").with_search("sweet", false))
        .with_column(2, TestColumn::new("stock").with_search("3", false))
        .query_string();

    let envelope = table
        .respond_query_string(&MemoryBackend, &base(), &query)
        .await
        .unwrap();

    assert_eq!(envelope.records_filtered, 1);
    assert_eq!(names(&envelope.data), vec![json!("apricot")]);
}

#[tokio::test]
async fn test_bad_numeric_filter_degrades() {
    let table = fruit_table();
    let query = request(&["name", "price"])
        .with_column(1, TestColumn::new("price").with_search("cheap", false))
        .query_string();

    let envelope = table
        .respond_query_string(&MemoryBackend, &base(), &query)
        .await
        .unwrap();

    assert_eq!(envelope.records_filtered, 6);
}

#[tokio::test]
async fn test_composite_column_orders_by_every_field() {
    let backend = MemoryBackend;
    let table = Table::builder()
        .column(
            "stock",
            "Stock, then price",
            CompositeColumn::new()
                .field(
                    backend.field("stock"),
                    Classification::Numeric(NumericKind::Integer),
                )
                .field(
                    backend.field("price"),
                    Classification::Numeric(NumericKind::Float),
                ),
        )
        .column("name", "Fruit", TextColumn::new(backend.field("name")))
        .build()
        .unwrap();

    let envelope = table
        .respond_query_string(
            &backend,
            &base(),
            "order[0][column]=0&order[0][dir]=desc&search[value]=10",
        )
        .await
        .unwrap();

    // "10" matches stock on two rows, never a price or a name.
    assert_eq!(envelope.records_filtered, 2);
    let fruit: Vec<Value> = envelope.data.iter().map(|row| row[1].clone()).collect();
    assert_eq!(fruit, vec![json!("Cherry"), json!("Apple")]);
}

/// A column that shows a derived value and searches by prefix.
struct Initial;

impl Column<MemoryBackend> for Initial {
    fn search(
        &self,
        backend: &MemoryBackend,
        token: &str,
        _regex: bool,
    ) -> Predicate<MemoryCondition> {
        let pattern = format!("^(?i){}", regex_escape(token));
        Predicate::Condition(backend.matches_pattern(&backend.field("name"), &pattern))
    }

    fn order(&self, backend: &MemoryBackend, direction: Direction) -> Vec<MemoryOrderKey> {
        vec![match direction {
            Direction::Asc => backend.ascending(&backend.field("name")),
            Direction::Desc => backend.descending(&backend.field("name")),
        }]
    }

    fn extract(&self, _name: &str, record: &Record) -> Value {
        record
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| name.chars().next())
            .map(|c| json!(c.to_uppercase().to_string()))
            .unwrap_or(Value::Null)
    }
}

fn regex_escape(token: &str) -> String {
    token
        .chars()
        .flat_map(|c| {
            let escape = !c.is_alphanumeric();
            escape.then_some('\\').into_iter().chain(std::iter::once(c))
        })
        .collect()
}

#[tokio::test]
async fn test_custom_column_behavior() {
    let table = Table::builder()
        .column("initial", "Initial", Initial)
        .column("stock", "Stock", BaseColumn)
        .build()
        .unwrap();

    let envelope = table
        .respond_query_string(
            &MemoryBackend,
            &base(),
            "search[value]=a&order[0][column]=0&order[0][dir]=asc",
        )
        .await
        .unwrap();

    assert_eq!(envelope.records_filtered, 2);
    assert_eq!(envelope.data, vec![json!(["A", 10]), json!(["A", 3])]);
}

#[test]
fn test_filter_defaults_to_search() {
    let backend = MemoryBackend;
    let column = TextColumn::new(backend.field("name"));

    assert!(column.filter(&backend, &SearchTerm::default()).is_neutral());
    assert!(!column.filter(&backend, &SearchTerm::new("x", true)).is_neutral());
}

#[test]
fn test_registration_rejects_duplicates() {
    let result = Table::<MemoryBackend>::builder()
        .column("name", "Fruit", BaseColumn)
        .column("name", "Again", BaseColumn)
        .build();

    assert_eq!(
        result.err().map(|e| e.to_string()),
        Some("column 'name' is declared more than once".to_string())
    );
    assert!(matches!(
        Table::<MemoryBackend>::builder().build().err(),
        Some(ConfigError::NoColumns)
    ));
}
