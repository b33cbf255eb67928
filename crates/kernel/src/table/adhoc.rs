//! Ad-hoc tables: a base query whose projected columns drive everything.
//!
//! Column names and value types come from introspecting the base query (or
//! from an explicit annotation when storage cannot report them). Request
//! columns are matched to projected columns by their `data` name, and rows
//! come back as objects keyed by column name.

use std::collections::HashSet;

use serde_json::Value;
use tracing::info;

use super::assemble::{ResultEnvelope, fetch_page};
use super::classify::classify;
use super::column::{Column, ColumnDescriptor};
use super::compose::compose;
use super::request::{Binding, SearchRequest};
use crate::backend::{Backend, DescribedColumn, Record};
use crate::config::PageLimits;
use crate::error::{ConfigError, IntrospectError};

/// A base query plus its classified columns.
pub struct AdHocTable<B: Backend> {
    base: B::Query,
    columns: Vec<ColumnDescriptor<B::Expr>>,
    limits: PageLimits,
}

impl<B: Backend> Clone for AdHocTable<B> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            columns: self.columns.clone(),
            limits: self.limits,
        }
    }
}

impl<B: Backend> AdHocTable<B> {
    /// Introspect `base` and classify its projected columns.
    pub async fn introspect(backend: &B, base: B::Query) -> Result<Self, IntrospectError<B::Error>> {
        let described = backend
            .describe(&base)
            .await
            .map_err(IntrospectError::Backend)?;
        Ok(Self::from_described(backend, base, described)?)
    }

    /// Build from explicitly annotated columns.
    ///
    /// Every column needs a unique, non-empty name and a determinable type.
    pub fn from_described(
        backend: &B,
        base: B::Query,
        described: Vec<DescribedColumn>,
    ) -> Result<Self, ConfigError> {
        if described.is_empty() {
            return Err(ConfigError::NoColumns);
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(described.len());

        for (position, column) in described.into_iter().enumerate() {
            let name = column.name.ok_or(ConfigError::UnnamedColumn { position })?;
            if name.is_empty() {
                return Err(ConfigError::EmptyName { position });
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateColumn { name });
            }
            let classification = classify(&column.value_type)
                .map_err(|_| ConfigError::UnknownType { name: name.clone() })?;

            columns.push(ColumnDescriptor {
                expr: backend.field(&name),
                name,
                classification,
            });
        }

        info!(
            columns = columns.len(),
            names = ?columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "registered ad-hoc table"
        );

        Ok(Self {
            base,
            columns,
            limits: PageLimits::default(),
        })
    }

    /// Replace the paging defaults.
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn base(&self) -> &B::Query {
        &self.base
    }

    pub fn columns(&self) -> &[ColumnDescriptor<B::Expr>] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Normalize a JSON payload.
    pub fn request_from_json(&self, payload: &Value) -> SearchRequest {
        SearchRequest::from_json(payload, &self.names(), Binding::ByData, &self.limits)
    }

    /// Normalize a flattened query string.
    pub fn request_from_query_string(&self, query: &str) -> SearchRequest {
        SearchRequest::from_query_string(query, &self.names(), Binding::ByData, &self.limits)
    }

    /// The base query with the request's filters and ordering applied.
    pub fn compose(&self, backend: &B, request: &SearchRequest) -> B::Query {
        let columns: Vec<&dyn Column<B>> = self
            .columns
            .iter()
            .map(|column| column as &dyn Column<B>)
            .collect();
        compose(backend, self.base.clone(), &columns, request)
    }

    /// Serve a normalized request.
    pub async fn respond(
        &self,
        backend: &B,
        request: &SearchRequest,
    ) -> Result<ResultEnvelope, B::Error> {
        let composed = self.compose(backend, request);
        let page = fetch_page(backend, &self.base, &composed, request.offset, request.limit).await?;

        Ok(page.into_envelope(request.draw, None, |record| self.shape(record)))
    }

    /// Serve a JSON payload.
    pub async fn respond_json(
        &self,
        backend: &B,
        payload: &Value,
    ) -> Result<ResultEnvelope, B::Error> {
        self.respond(backend, &self.request_from_json(payload)).await
    }

    /// Serve a flattened query string.
    pub async fn respond_query_string(
        &self,
        backend: &B,
        query: &str,
    ) -> Result<ResultEnvelope, B::Error> {
        self.respond(backend, &self.request_from_query_string(query))
            .await
    }

    fn shape(&self, record: &Record) -> Value {
        let object = self
            .columns
            .iter()
            .map(|column| {
                (
                    column.name.clone(),
                    Column::<B>::extract(column, &column.name, record),
                )
            })
            .collect();
        Value::Object(object)
    }
}
