//! Query Module - statement trees rendered to PostgreSQL

pub mod dml;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod upsert;
pub mod where_clause;

pub use dml::{CountStatement, DeleteStatement, ExistsStatement, InsertStatement, UpdateStatement};
pub use select::{FromSource, JoinClause, JoinSource, Projection, SelectStatement};
pub use sql_generation::{quote_ident, BoundQuery, SqlWriter};
pub use types::{col, ColumnRef, JoinType, OrderDirection, OrderSpec, QueryOperator};
pub use upsert::UpsertStatement;
pub use where_clause::Condition;
