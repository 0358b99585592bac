//! Relationship declarations, the schema graph and path resolution

pub mod metadata;
pub mod registry;
pub mod resolver;

pub use metadata::*;
pub use registry::{global, install_with, SchemaGraph, SchemaGraphBuilder};
pub use resolver::{resolve, RelationshipPath};
