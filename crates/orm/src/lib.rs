//! # relgraph-orm: Relationship-aware data access
//!
//! Eager loading of named relationship paths over a static schema graph:
//! relation names are resolved to their shortest path from a root entity,
//! merged into one statement with a loading strategy per hop, cached by
//! request shape and executed through a generic CRUD repository inside a
//! caller-owned transaction.
//!
//! ```ignore
//! let graph = relationships::install_with(build_schema)?;
//! let plan = select_with_relationships(&LoadRequest::new("User").relation("role"))?;
//! let user = CrudRepository::new(graph, "User")?
//!     .select(&mut tx, &[col("login").eq("a@b.com")], Some(&plan))
//!     .await?
//!     .result()?;
//! ```

pub mod backends;
pub mod config;
pub mod database;
pub mod error;
pub mod loading;
pub mod query;
pub mod relationships;
pub mod repository;

// Re-export core traits and types
pub use backends::*;
pub use config::*;
pub use database::*;
pub use error::*;
pub use loading::*;
pub use query::*;
pub use relationships::*;
pub use repository::*;
