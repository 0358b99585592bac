//! Database Backend Abstractions
//!
//! Traits the repository executes through, plus the PostgreSQL implementation.

pub mod core;
pub mod postgres;

// Re-export core traits and types
pub use self::core::*;
pub use postgres::{PostgresRow, PostgresTransaction};
