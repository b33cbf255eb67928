//! The table engine.
//!
//! Requests are normalized ([`request`]), folded onto a base query
//! ([`compose`]) using per-column behaviors ([`column`]) and predicates
//! ([`predicate`]), then executed and shaped ([`assemble`]). [`adhoc`] and
//! [`declarative`] wire these together for the two table styles.

pub mod adhoc;
pub mod assemble;
pub mod classify;
pub mod column;
pub mod compose;
pub mod declarative;
pub mod predicate;
pub mod request;

pub use adhoc::AdHocTable;
pub use assemble::{ColumnMeta, Page, ResultEnvelope, fetch_page};
pub use classify::{Classification, NumericKind, Unclassifiable, ValueType, classify};
pub use column::{
    BaseColumn, Column, ColumnDescriptor, CompositeColumn, ListColumn, NumericColumn, TextColumn,
};
pub use compose::compose;
pub use declarative::{Table, TableBuilder};
pub use predicate::{Literal, Predicate, build_predicate};
pub use request::{
    Binding, ColumnRequest, Direction, OrderEntry, SearchRequest, SearchTerm, tokenize, unflatten,
};
