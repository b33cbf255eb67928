//! Executing a composed query and shaping the response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, Record};

/// Display metadata for one declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub label: String,
}

/// Response to one table request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub draw: i64,
    /// Rows in the base query.
    pub records_total: u64,
    /// Rows left after filtering, before paging.
    pub records_filtered: u64,
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnMeta>>,
}

/// Counts and rows of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records_total: u64,
    pub records_filtered: u64,
    pub rows: Vec<Record>,
}

impl Page {
    /// Wrap the page into an envelope, shaping each row with `shape`.
    pub fn into_envelope<F>(self, draw: i64, columns: Option<Vec<ColumnMeta>>, shape: F) -> ResultEnvelope
    where
        F: Fn(&Record) -> Value,
    {
        ResultEnvelope {
            draw,
            records_total: self.records_total,
            records_filtered: self.records_filtered,
            data: self.rows.iter().map(shape).collect(),
            columns,
        }
    }
}

/// Count the base and composed queries and fetch one page of the latter.
///
/// Storage errors are returned unmodified.
pub async fn fetch_page<B: Backend>(
    backend: &B,
    base: &B::Query,
    composed: &B::Query,
    offset: u64,
    limit: u64,
) -> Result<Page, B::Error> {
    let records_total = backend.count(base).await?;
    let records_filtered = backend.count(composed).await?;
    let rows = backend.fetch(composed, offset, limit).await?;

    debug!(
        records_total,
        records_filtered,
        returned = rows.len(),
        offset,
        limit,
        "assembled table page"
    );

    Ok(Page {
        records_total,
        records_filtered,
        rows,
    })
}
