//! Folding a normalized request onto a base query.

use tracing::debug;

use super::column::Column;
use super::predicate::{Predicate, all, any};
use super::request::SearchRequest;
use crate::backend::Backend;

/// Apply per-column filters, the global search and ordering to `base`.
///
/// `columns` and `request.columns` are aligned by position. Steps, in order:
///
/// 1. Every column's own filters, ANDed.
/// 2. The global search value split into words; each word must match at
///    least one searchable column (AND of per-word ORs).
/// 3. Requested sort keys of orderable columns, appended in request order.
///
/// Paging is not applied.
pub fn compose<B>(
    backend: &B,
    base: B::Query,
    columns: &[&dyn Column<B>],
    request: &SearchRequest,
) -> B::Query
where
    B: Backend + ?Sized,
{
    let pairs = || columns.iter().zip(&request.columns);

    let filters = all(
        backend,
        pairs().flat_map(|(column, settings)| {
            settings
                .filters()
                .map(move |term| column.filter(backend, term))
        }),
    );

    let tokens = request.search.tokens();
    let search = all(
        backend,
        tokens.iter().map(|token| {
            any(
                backend,
                pairs()
                    .filter(|(_, settings)| settings.searchable)
                    .map(|(column, _)| column.search(backend, token, request.search.regex)),
            )
        }),
    );

    let keys: Vec<B::OrderKey> = request
        .order
        .iter()
        .filter(|entry| {
            request
                .columns
                .get(entry.column)
                .is_some_and(|settings| settings.orderable)
        })
        .filter_map(|entry| columns.get(entry.column).map(|column| (column, entry.direction)))
        .flat_map(|(column, direction)| column.order(backend, direction))
        .collect();

    debug!(
        filtered = !filters.is_neutral(),
        tokens = tokens.len(),
        searched = !search.is_neutral(),
        order_keys = keys.len(),
        "composed table query"
    );

    let mut query = apply(backend, base, filters);
    query = apply(backend, query, search);
    if !keys.is_empty() {
        query = backend.order_by(query, keys);
    }
    query
}

fn apply<B>(backend: &B, query: B::Query, predicate: Predicate<B::Condition>) -> B::Query
where
    B: Backend + ?Sized,
{
    match predicate {
        Predicate::Neutral => query,
        Predicate::Condition(condition) => backend.filter(query, condition),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::memory::{
        MemoryBackend, MemoryCondition, MemoryOrderKey, MemoryQuery, MemoryTable,
    };
    use crate::config::PageLimits;
    use crate::table::request::{Binding, Direction};
    use crate::table::{BaseColumn, NumericColumn, TextColumn};
    use serde_json::{Value, json};

    struct Fixture {
        summary: TextColumn<String>,
        year: NumericColumn<String>,
        notes: BaseColumn,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                summary: TextColumn::new("summary".into()),
                year: NumericColumn::integer("year".into()),
                notes: BaseColumn,
            }
        }

        fn columns(&self) -> Vec<&dyn Column<MemoryBackend>> {
            let columns: [&dyn Column<MemoryBackend>; 3] = [&self.summary, &self.year, &self.notes];
            columns.to_vec()
        }

        fn compose(&self, payload: Value) -> MemoryQuery {
            let request = SearchRequest::from_json(
                &payload,
                &["summary", "year", "notes"],
                Binding::Positional,
                &PageLimits::default(),
            );
            compose(
                &MemoryBackend,
                MemoryQuery::new(MemoryTable::new()),
                &self.columns(),
                &request,
            )
        }
    }

    fn contains(field: &str, needle: &str) -> MemoryCondition {
        MemoryCondition::ContainsCi {
            field: field.into(),
            needle: needle.into(),
        }
    }

    #[test]
    fn empty_request_leaves_query_untouched() {
        let query = Fixture::new().compose(json!({}));
        assert!(query.conditions().is_empty());
        assert!(query.order_keys().is_empty());
    }

    #[test]
    fn global_search_is_and_of_ors() {
        let query = Fixture::new().compose(json!({"search": {"value": "  foo   bar "}}));

        // Year drops out (text tokens), notes is a base column.
        assert_eq!(
            query.conditions(),
            &[MemoryCondition::All(vec![
                contains("summary", "foo"),
                contains("summary", "bar"),
            ])]
        );
    }

    #[test]
    fn global_search_ors_across_searchable_columns() {
        let query = Fixture::new().compose(json!({"search": {"value": "2020 tax"}}));

        assert_eq!(
            query.conditions(),
            &[MemoryCondition::All(vec![
                MemoryCondition::Any(vec![
                    contains("summary", "2020"),
                    MemoryCondition::Equals {
                        field: "year".into(),
                        literal: crate::table::Literal::Integer(2020),
                    },
                ]),
                contains("summary", "tax"),
            ])]
        );
    }

    #[test]
    fn unsearchable_columns_are_skipped() {
        let query = Fixture::new().compose(json!({
            "search": {"value": "tax"},
            "columns": [{"searchable": false}],
        }));
        assert!(query.conditions().is_empty());
    }

    #[test]
    fn column_filters_come_first() {
        let query = Fixture::new().compose(json!({
            "search": {"value": "tax"},
            "columns": [
                {"search": {"value": "Hello"}},
                {"search": {"value": "oops"}},
            ],
        }));

        assert_eq!(
            query.conditions(),
            &[contains("summary", "Hello"), contains("summary", "tax")]
        );
    }

    #[test]
    fn ordering_respects_request_and_orderable() {
        let query = Fixture::new().compose(json!({
            "columns": [{}, {"orderable": false}],
            "order": [
                {"column": -1, "dir": "asc"},
                {"column": 1, "dir": "asc"},
                {"column": 2, "dir": "desc"},
                {"column": 0, "dir": "desc"},
            ],
        }));

        assert_eq!(
            query.order_keys(),
            &[MemoryOrderKey {
                field: "summary".into(),
                direction: Direction::Desc,
            }]
        );
    }
}
