//! Declaratively defined tables.
//!
//! A [`Table`] is an ordered list of named, labeled columns, each with its
//! own [`Column`] behavior. Request column `i` is declared column `i`, and
//! rows come back as arrays aligned with the declaration plus the column
//! metadata.

use std::collections::HashSet;

use serde_json::Value;
use tracing::info;

use super::assemble::{ColumnMeta, ResultEnvelope, fetch_page};
use super::column::Column;
use super::compose::compose;
use super::request::{Binding, SearchRequest};
use crate::backend::{Backend, Record};
use crate::config::PageLimits;
use crate::error::ConfigError;

struct Entry<B: Backend> {
    name: String,
    label: String,
    behavior: Box<dyn Column<B>>,
}

/// Collects column declarations for a [`Table`].
pub struct TableBuilder<B: Backend> {
    entries: Vec<Entry<B>>,
    limits: PageLimits,
}

impl<B: Backend> Default for TableBuilder<B> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            limits: PageLimits::default(),
        }
    }
}

impl<B: Backend> TableBuilder<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the next column. `name` is also the row field the column's
    /// value is read from.
    pub fn column(
        mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        behavior: impl Column<B> + 'static,
    ) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            label: label.into(),
            behavior: Box::new(behavior),
        });
        self
    }

    /// Replace the paging defaults.
    pub fn limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate the declarations.
    pub fn build(self) -> Result<Table<B>, ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::NoColumns);
        }

        let mut seen = HashSet::new();
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.name.is_empty() {
                return Err(ConfigError::EmptyName { position });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateColumn {
                    name: entry.name.clone(),
                });
            }
        }

        info!(
            columns = self.entries.len(),
            names = ?self.entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            "registered table"
        );

        Ok(Table {
            entries: self.entries,
            limits: self.limits,
        })
    }
}

/// A validated table definition. Immutable and shareable across requests.
pub struct Table<B: Backend> {
    entries: Vec<Entry<B>>,
    limits: PageLimits,
}

impl<B: Backend> Table<B> {
    pub fn builder() -> TableBuilder<B> {
        TableBuilder::new()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Column metadata, in declaration order.
    pub fn columns(&self) -> Vec<ColumnMeta> {
        self.entries
            .iter()
            .map(|e| ColumnMeta {
                name: e.name.clone(),
                label: e.label.clone(),
            })
            .collect()
    }

    pub fn request_from_json(&self, payload: &Value) -> SearchRequest {
        SearchRequest::from_json(payload, &self.names(), Binding::Positional, &self.limits)
    }

    pub fn request_from_query_string(&self, query: &str) -> SearchRequest {
        SearchRequest::from_query_string(query, &self.names(), Binding::Positional, &self.limits)
    }

    /// `base` with the request's filters and ordering applied.
    pub fn compose(&self, backend: &B, base: B::Query, request: &SearchRequest) -> B::Query {
        let columns: Vec<&dyn Column<B>> = self
            .entries
            .iter()
            .map(|e| e.behavior.as_ref() as &dyn Column<B>)
            .collect();
        compose(backend, base, &columns, request)
    }

    /// Serve a normalized request against `base`.
    pub async fn respond(
        &self,
        backend: &B,
        base: &B::Query,
        request: &SearchRequest,
    ) -> Result<ResultEnvelope, B::Error> {
        let composed = self.compose(backend, base.clone(), request);
        let page = fetch_page(backend, base, &composed, request.offset, request.limit).await?;

        Ok(page.into_envelope(request.draw, Some(self.columns()), |record| self.shape(record)))
    }

    /// Serve a flattened query string against `base`.
    pub async fn respond_query_string(
        &self,
        backend: &B,
        base: &B::Query,
        query: &str,
    ) -> Result<ResultEnvelope, B::Error> {
        self.respond(backend, base, &self.request_from_query_string(query))
            .await
    }

    /// Serve a JSON payload against `base`.
    pub async fn respond_json(
        &self,
        backend: &B,
        base: &B::Query,
        payload: &Value,
    ) -> Result<ResultEnvelope, B::Error> {
        self.respond(backend, base, &self.request_from_json(payload))
            .await
    }

    fn shape(&self, record: &Record) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|e| e.behavior.extract(&e.name, record))
                .collect(),
        )
    }
}
