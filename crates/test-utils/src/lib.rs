//! Tabula test utilities.
//!
//! Helpers for integration testing: in-memory datasets, a request builder
//! producing both JSON and flattened query-string payloads, and assertion
//! utilities for result envelopes.

use serde_json::{Value, json};
use tabula_kernel::{MemoryTable, ValueType};

/// Fruit with a text name, float price, integer stock and text tags.
///
/// Rows: Apple, Banana, apricot, Cherry, Date, Elderberry. Apricot has no
/// price and Date has no tags.
pub fn fruits() -> MemoryTable {
    MemoryTable::new()
        .column("name", ValueType::Text)
        .column("price", ValueType::Float)
        .column("stock", ValueType::Integer)
        .column("tags", ValueType::Array(Box::new(ValueType::Text)))
        .rows([
            json!({"name": "Apple", "price": 1.5, "stock": 10, "tags": ["red", "sweet"]}),
            json!({"name": "Banana", "price": 0.5, "stock": 25, "tags": ["yellow"]}),
            json!({"name": "apricot", "price": null, "stock": 3, "tags": ["orange", "sweet"]}),
            json!({"name": "Cherry", "price": 4.0, "stock": 10, "tags": ["red"]}),
            json!({"name": "Date", "price": 3.25, "stock": 0, "tags": null}),
            json!({"name": "Elderberry", "price": 6.0, "stock": 8, "tags": ["dark"]}),
        ])
}

/// `count` documents with an integer `year` and a text `summary`.
///
/// Document `i` (from 1) has year `2000 + i % 5` and summary `Document i`.
/// Every third summary also mentions `Hello World`.
pub fn documents(count: usize) -> MemoryTable {
    MemoryTable::new()
        .column("id", ValueType::Integer)
        .column("year", ValueType::Integer)
        .column("summary", ValueType::Text)
        .rows((1..=count).map(|i| {
            let summary = if i % 3 == 0 {
                format!("Document {i}: Hello World")
            } else {
                format!("Document {i}")
            };
            json!({"id": i, "year": 2000 + i % 5, "summary": summary})
        }))
}

/// One request column.
#[derive(Debug, Clone)]
pub struct TestColumn {
    pub data: String,
    pub searchable: bool,
    pub orderable: bool,
    pub search: String,
    pub regex: bool,
}

impl TestColumn {
    pub fn new(data: &str) -> Self {
        Self {
            data: data.to_string(),
            searchable: true,
            orderable: true,
            search: String::new(),
            regex: false,
        }
    }

    /// Exclude from the global search.
    pub fn unsearchable(mut self) -> Self {
        self.searchable = false;
        self
    }

    /// Ignore ordering requests for this column.
    pub fn unorderable(mut self) -> Self {
        self.orderable = false;
        self
    }

    /// Set the column's own filter.
    pub fn with_search(mut self, value: &str, regex: bool) -> Self {
        self.search = value.to_string();
        self.regex = regex;
        self
    }
}

/// Builder for client table requests.
#[derive(Debug, Clone, Default)]
pub struct TestRequest {
    pub draw: i64,
    pub start: i64,
    pub length: i64,
    pub search: String,
    pub regex: bool,
    pub columns: Vec<TestColumn>,
    /// `(column, dir)` pairs; `column` may be out of range on purpose.
    pub order: Vec<(i64, String)>,
}

/// Start a request for columns named `data`.
pub fn request(data: &[&str]) -> TestRequest {
    TestRequest {
        draw: 1,
        start: 0,
        length: 10,
        columns: data.iter().map(|d| TestColumn::new(d)).collect(),
        ..TestRequest::default()
    }
}

impl TestRequest {
    pub fn with_draw(mut self, draw: i64) -> Self {
        self.draw = draw;
        self
    }

    pub fn page(mut self, start: i64, length: i64) -> Self {
        self.start = start;
        self.length = length;
        self
    }

    /// Set the global search.
    pub fn search(mut self, value: &str) -> Self {
        self.search = value.to_string();
        self.regex = false;
        self
    }

    /// Set the global search as a regular expression.
    pub fn search_regex(mut self, pattern: &str) -> Self {
        self.search = pattern.to_string();
        self.regex = true;
        self
    }

    /// Replace column `index`.
    pub fn with_column(mut self, index: usize, column: TestColumn) -> Self {
        if let Some(slot) = self.columns.get_mut(index) {
            *slot = column;
        }
        self
    }

    /// Append an order entry.
    pub fn order(mut self, column: i64, dir: &str) -> Self {
        self.order.push((column, dir.to_string()));
        self
    }

    /// Structured JSON payload.
    pub fn json(&self) -> Value {
        json!({
            "draw": self.draw,
            "start": self.start,
            "length": self.length,
            "search": {"value": self.search, "regex": self.regex},
            "columns": self.columns.iter().map(|c| json!({
                "data": c.data,
                "name": "",
                "searchable": c.searchable,
                "orderable": c.orderable,
                "search": {"value": c.search, "regex": c.regex},
            })).collect::<Vec<_>>(),
            "order": self.order.iter().map(|(column, dir)| json!({
                "column": column,
                "dir": dir,
            })).collect::<Vec<_>>(),
        })
    }

    /// Flattened, URL-encoded query string carrying the same request.
    pub fn query_string(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("draw", &self.draw.to_string())
            .append_pair("start", &self.start.to_string())
            .append_pair("length", &self.length.to_string())
            .append_pair("search[value]", &self.search)
            .append_pair("search[regex]", &self.regex.to_string());

        for (i, c) in self.columns.iter().enumerate() {
            query
                .append_pair(&format!("columns[{i}][data]"), &c.data)
                .append_pair(&format!("columns[{i}][name]"), "")
                .append_pair(&format!("columns[{i}][searchable]"), &c.searchable.to_string())
                .append_pair(&format!("columns[{i}][orderable]"), &c.orderable.to_string())
                .append_pair(&format!("columns[{i}][search][value]"), &c.search)
                .append_pair(&format!("columns[{i}][search][regex]"), &c.regex.to_string());
        }

        for (k, (column, dir)) in self.order.iter().enumerate() {
            query
                .append_pair(&format!("order[{k}][column]"), &column.to_string())
                .append_pair(&format!("order[{k}][dir]"), dir);
        }

        query.finish()
    }
}

/// Assertion helpers for result envelopes.
pub mod assert {
    use serde_json::Value;
    use tabula_kernel::ResultEnvelope;

    /// Values of `field` in each object row, in order.
    pub fn field_values(envelope: &ResultEnvelope, field: &str) -> Vec<Value> {
        envelope
            .data
            .iter()
            .map(|row| row.get(field).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Assert the `field` values of the returned rows.
    pub fn fields_eq(envelope: &ResultEnvelope, field: &str, expected: &[Value]) {
        let actual = field_values(envelope, field);
        assert_eq!(
            actual, expected,
            "unexpected '{field}' values in envelope data"
        );
    }

    /// Assert two envelopes are equal apart from `draw`.
    pub fn same_result(a: &ResultEnvelope, b: &ResultEnvelope) {
        assert_eq!(a.records_total, b.records_total, "recordsTotal differs");
        assert_eq!(a.records_filtered, b.records_filtered, "recordsFiltered differs");
        assert_eq!(a.data, b.data, "data differs");
        assert_eq!(a.columns, b.columns, "columns differ");
    }
}
