//! PostgreSQL backend using SeaQuery and sqlx.
//!
//! The base query is wrapped as a `WITH "base" AS (...)` common table
//! expression; filters, ordering and paging are applied to `"base"` with
//! SeaQuery. Rows come back as `row_to_json` objects.

use std::time::Duration;

use async_trait::async_trait;
use sea_query::extension::postgres::{PgBinOper, PgFunc};
use sea_query::{
    Alias, Asterisk, Cond, Expr, Order, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
};
use sqlx::{Column, Executor, PgPool, Statement, TypeInfo};
use tracing::debug;

use super::{Backend, DescribedColumn, Record};
use crate::config::Config;
use crate::table::{Literal, ValueType};

/// Alias the base query is bound to inside composed statements.
pub const BASE_ALIAS: &str = "base";

/// Name PostgreSQL gives to un-aliased expressions.
const ANONYMOUS_COLUMN: &str = "?column?";

/// Base query plus folded-in filters and ordering.
#[derive(Debug, Clone)]
pub struct PgQuery {
    base_sql: String,
    conditions: Vec<SimpleExpr>,
    order: Vec<PgOrderKey>,
}

/// One ORDER BY expression.
#[derive(Debug, Clone)]
pub struct PgOrderKey {
    expr: SimpleExpr,
    order: Order,
}

impl PgQuery {
    /// Wrap a SeaQuery select statement.
    pub fn from_statement(statement: &SelectStatement) -> Self {
        Self::from_sql(statement.to_string(PostgresQueryBuilder))
    }

    /// Wrap trusted SQL. The text is embedded as-is, so it must never carry
    /// request data.
    pub fn from_sql(sql: impl Into<String>) -> Self {
        Self {
            base_sql: sql.into(),
            conditions: Vec::new(),
            order: Vec::new(),
        }
    }

    /// SQL of the wrapped base query.
    pub fn base_sql(&self) -> &str {
        &self.base_sql
    }

    /// Full statement without paging.
    pub fn select_sql(&self) -> String {
        let mut select = Query::select();
        select.column(Asterisk);
        self.shape(&mut select);
        self.with_base(&select)
    }

    /// `COUNT(*)` over the filtered rows.
    pub fn count_sql(&self) -> String {
        let mut select = Query::select();
        select.expr(Expr::col(Asterisk).count());
        select.from(Alias::new(BASE_ALIAS));
        for condition in &self.conditions {
            select.and_where(condition.clone());
        }
        self.with_base(&select)
    }

    /// One page of rows, each as a JSON object.
    pub fn page_sql(&self, offset: u64, limit: u64) -> String {
        let mut select = Query::select();
        select.expr(Expr::cust(format!("row_to_json(\"{BASE_ALIAS}\")")));
        self.shape(&mut select);
        select.limit(limit);
        select.offset(offset);
        self.with_base(&select)
    }

    fn shape(&self, select: &mut SelectStatement) {
        select.from(Alias::new(BASE_ALIAS));
        for condition in &self.conditions {
            select.and_where(condition.clone());
        }
        for key in &self.order {
            select.order_by_expr(key.expr.clone(), key.order.clone());
        }
    }

    fn with_base(&self, outer: &SelectStatement) -> String {
        format!(
            "WITH \"{BASE_ALIAS}\" AS ({}) {}",
            self.base_sql,
            outer.to_string(PostgresQueryBuilder)
        )
    }
}

/// Backend executing against a PostgreSQL pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgBackend {
    /// Create a backend with a per-statement timeout.
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Create a backend using the configured statement timeout.
    pub fn from_config(pool: PgPool, config: &Config) -> Self {
        Self::new(pool, config.statement_timeout)
    }

    fn timeout_sql(&self) -> String {
        format!(
            "SET LOCAL statement_timeout = '{}ms'",
            self.statement_timeout.as_millis()
        )
    }
}

#[async_trait]
impl Backend for PgBackend {
    type Expr = SimpleExpr;
    type Condition = SimpleExpr;
    type OrderKey = PgOrderKey;
    type Query = PgQuery;
    type Error = sqlx::Error;

    fn field(&self, name: &str) -> SimpleExpr {
        Expr::col((Alias::new(BASE_ALIAS), Alias::new(name))).into()
    }

    fn conjoin(&self, conditions: Vec<SimpleExpr>) -> SimpleExpr {
        conditions
            .into_iter()
            .fold(Cond::all(), |cond, expr| cond.add(expr))
            .into()
    }

    fn disjoin(&self, conditions: Vec<SimpleExpr>) -> SimpleExpr {
        conditions
            .into_iter()
            .fold(Cond::any(), |cond, expr| cond.add(expr))
            .into()
    }

    fn equals(&self, expr: &SimpleExpr, literal: &Literal) -> SimpleExpr {
        expr.clone().eq(literal_value(literal))
    }

    fn contains_ci(&self, expr: &SimpleExpr, needle: &str) -> SimpleExpr {
        let pattern = format!("%{}%", escape_like_wildcards(needle));
        expr.clone().binary(PgBinOper::ILike, Expr::val(pattern))
    }

    fn matches_pattern(&self, expr: &SimpleExpr, pattern: &str) -> SimpleExpr {
        expr.clone().binary(PgBinOper::Regex, Expr::val(pattern))
    }

    /// Overlap with a one-element array, rendered as `literal = ANY(expr)` so
    /// the literal is coerced to whatever element type the column has.
    fn array_overlaps(&self, expr: &SimpleExpr, literal: &Literal) -> SimpleExpr {
        Expr::val(literal_value(literal)).eq(PgFunc::any(expr.clone()))
    }

    fn ascending(&self, expr: &SimpleExpr) -> PgOrderKey {
        PgOrderKey {
            expr: expr.clone(),
            order: Order::Asc,
        }
    }

    fn descending(&self, expr: &SimpleExpr) -> PgOrderKey {
        PgOrderKey {
            expr: expr.clone(),
            order: Order::Desc,
        }
    }

    fn filter(&self, mut query: PgQuery, condition: SimpleExpr) -> PgQuery {
        query.conditions.push(condition);
        query
    }

    fn order_by(&self, mut query: PgQuery, keys: Vec<PgOrderKey>) -> PgQuery {
        query.order.extend(keys);
        query
    }

    async fn count(&self, query: &PgQuery) -> Result<u64, sqlx::Error> {
        let sql = query.count_sql();
        debug!(sql = %sql, "executing count query");

        // SET LOCAL only lasts until the transaction ends.
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.timeout_sql()).execute(&mut *tx).await?;
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn fetch(
        &self,
        query: &PgQuery,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let sql = query.page_sql(offset, limit);
        debug!(sql = %sql, "executing page query");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.timeout_sql()).execute(&mut *tx).await?;
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| match row {
                serde_json::Value::Object(record) => record,
                _ => Record::new(),
            })
            .collect())
    }

    async fn describe(&self, query: &PgQuery) -> Result<Vec<DescribedColumn>, sqlx::Error> {
        let statement = (&self.pool).prepare(query.base_sql()).await?;

        Ok(statement
            .columns()
            .iter()
            .map(|column| DescribedColumn {
                name: Some(column.name())
                    .filter(|name| !name.is_empty() && *name != ANONYMOUS_COLUMN)
                    .map(str::to_string),
                value_type: ValueType::from_pg_name(column.type_info().name()),
            })
            .collect())
    }
}

fn literal_value(literal: &Literal) -> sea_query::Value {
    match literal {
        Literal::Integer(i) => (*i).into(),
        Literal::Float(f) => (*f).into(),
        Literal::Text(s) => s.clone().into(),
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
