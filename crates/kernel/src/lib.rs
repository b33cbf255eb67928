//! Tabula Kernel Library
//!
//! Turns a base tabular query plus a client request (paging, free-text
//! search, per-column search, multi-column sort) into a filtered, sorted and
//! paginated result envelope.
//!
//! Two usage styles share one engine:
//! - [`AdHocTable`]: a base query whose projected columns are introspected
//!   (or annotated) and classified by value type.
//! - [`Table`]: a declaratively defined table with an explicit behavior
//!   object per column.
//!
//! Storage is reached only through the [`Backend`] trait. The kernel ships a
//! PostgreSQL backend ([`PgBackend`]) and an in-memory one ([`MemoryBackend`]).

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod table;

pub use backend::memory::{MemoryBackend, MemoryQuery, MemoryTable};
pub use backend::postgres::{PgBackend, PgQuery};
pub use backend::{Backend, DescribedColumn, Record};
pub use config::{Config, PageLimits};
pub use error::{ConfigError, IntrospectError, MemoryError};
pub use table::{
    AdHocTable, BaseColumn, Binding, Classification, Column, ColumnDescriptor, ColumnMeta,
    ColumnRequest, CompositeColumn, Direction, ListColumn, Literal, NumericColumn, NumericKind,
    OrderEntry, Predicate, ResultEnvelope, SearchRequest, SearchTerm, Table, TableBuilder,
    TextColumn, ValueType,
};
